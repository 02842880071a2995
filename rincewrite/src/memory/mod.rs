//! # Memory: conversation state store
//!
//! Per-thread checkpoints of graph state. A [`Checkpointer`] keys checkpoints by
//! `(thread_id, checkpoint_ns, checkpoint_id)` and returns the latest one for a
//! thread; the compiled graph writes one after every completed node.
//!
//! | Type            | Persistence | Use case                 |
//! |-----------------|-------------|--------------------------|
//! | [`MemorySaver`] | In-memory   | Default, tests           |
//! | [`SqliteSaver`] | SQLite file | Conversations that survive restarts |
//!
//! [`JsonSerializer`] is required for `SqliteSaver` (state must be
//! `Serialize + DeserializeOwned`).

mod checkpoint;
mod checkpointer;
mod config;
mod memory_saver;
mod serializer;
mod sqlite_saver;

pub use checkpoint::{Checkpoint, CheckpointListItem, CheckpointMetadata, CheckpointSource};
pub use checkpointer::{CheckpointError, Checkpointer};
pub use config::RunnableConfig;
pub use memory_saver::MemorySaver;
pub use serializer::{JsonSerializer, Serializer};
pub use sqlite_saver::SqliteSaver;

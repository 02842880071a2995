//! Checkpointer trait and CheckpointError.
//!
//! Saves and loads checkpoints by (thread_id, checkpoint_ns, checkpoint_id).

use async_trait::async_trait;

use crate::memory::checkpoint::{Checkpoint, CheckpointListItem, CheckpointMetadata};
use crate::memory::config::RunnableConfig;

/// Error type for checkpoint operations.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("thread_id required")]
    ThreadIdRequired,
    #[error("serialization: {0}")]
    Serialization(String),
    #[error("storage: {0}")]
    Storage(String),
    #[error("not found: {0}")]
    NotFound(String),
}

/// Durable key-value store of checkpoints, keyed by thread.
///
/// Implementations: [`MemorySaver`](super::MemorySaver) (in-memory) and
/// [`SqliteSaver`](super::SqliteSaver) (SQLite file).
///
/// **Interaction**: Injected at compile via `StateGraph::compile_with_checkpointer`;
/// the compiled graph writes one checkpoint per completed node.
#[async_trait]
pub trait Checkpointer<S>: Send + Sync
where
    S: Clone + Send + Sync + 'static,
{
    /// Persist a checkpoint for the thread. Returns the checkpoint id used.
    async fn put(
        &self,
        config: &RunnableConfig,
        checkpoint: &Checkpoint<S>,
    ) -> Result<String, CheckpointError>;

    /// Load the latest checkpoint for the thread (or the one given by `config.checkpoint_id`).
    async fn get_tuple(
        &self,
        config: &RunnableConfig,
    ) -> Result<Option<(Checkpoint<S>, CheckpointMetadata)>, CheckpointError>;

    /// List checkpoints for the thread, oldest first. `limit` keeps the newest `n`;
    /// `before` keeps only checkpoints written before the given id.
    async fn list(
        &self,
        config: &RunnableConfig,
        limit: Option<usize>,
        before: Option<&str>,
    ) -> Result<Vec<CheckpointListItem>, CheckpointError>;
}

/// Applies `before` and `limit` to a history list ordered oldest first.
pub(crate) fn window_history(
    mut items: Vec<CheckpointListItem>,
    limit: Option<usize>,
    before: Option<&str>,
) -> Vec<CheckpointListItem> {
    if let Some(b) = before {
        if let Some(pos) = items.iter().position(|i| i.checkpoint_id.as_str() == b) {
            items.truncate(pos);
        }
    }
    if let Some(n) = limit {
        let len = items.len();
        if len > n {
            items.drain(..len - n);
        }
    }
    items
}

//! # Rincewrite
//!
//! A writing companion: an intake step collects what the piece is and who is
//! writing it, then a chat loop streams replies from a language model. The
//! conversation is a small resumable state graph persisted per thread.
//!
//! ## Design principles
//!
//! - **Single state type**: every node of a graph reads and returns the same
//!   state ([`ConversationState`] for the conversation).
//! - **Interrupt before, resume with a patch**: the graph halts before
//!   `user_action`; a turn resumes it with an explicit [`ResumePatch`].
//! - **Checkpoint after every node**: a failed node leaves the stored thread as it
//!   was, so the same turn can be retried.
//! - **Pure UI core**: [`app::update`] maps actions to a new [`AppState`] plus
//!   effects; [`Session`] performs them.
//!
//! ## Main modules
//!
//! - [`graph`]: [`StateGraph`], [`CompiledStateGraph`], [`Node`], [`Next`], [`RunContext`], [`RetryPolicy`].
//! - [`conversation`]: [`ConversationGraph`] (`start`, `resume`, `snapshot`), [`ConversationEvent`].
//! - [`memory`]: [`Checkpointer`], [`MemorySaver`], [`SqliteSaver`], [`RunnableConfig`].
//! - [`llm`]: [`LlmClient`], [`ChatOpenAI`], [`MockLlm`], [`ModelDelta`].
//! - [`prompts`]: [`PromptRegistry`], [`PromptTemplate`].
//! - [`stream`]: [`StreamEvent`], [`StreamMode`], [`ChunkToStreamSender`].
//! - [`app`]: [`AppState`], [`Action`], [`Effect`], [`Session`], [`View`].
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use futures::StreamExt;
//! use rincewrite::{ConversationEvent, ConversationGraph, Intake, MockLlm, ResumePatch};
//!
//! # async fn run() -> Result<(), rincewrite::ConversationError> {
//! let graph = ConversationGraph::new(Arc::new(MockLlm::new("Hello!")))?;
//! let intake = Intake {
//!     piece_name: "Dune Two".into(),
//!     piece_description: "sequel outline".into(),
//!     user_name: "Ada".into(),
//!     user_description: "aspiring novelist".into(),
//! };
//! let mut events = graph.start("thread-1", intake).await?;
//! while let Some(event) = events.next().await {
//!     if let ConversationEvent::Token { text, .. } = event {
//!         print!("{}", text);
//!     }
//! }
//! let mut events = graph
//!     .resume("thread-1", ResumePatch::message("Let's outline chapter one"))
//!     .await?;
//! while events.next().await.is_some() {}
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod conversation;
pub mod error;
pub mod graph;
pub mod llm;
pub mod memory;
pub mod message;
pub mod prompts;
pub mod state;
pub mod stream;

pub use app::{Action, AppState, DisplayMessage, Effect, Session, View};
pub use conversation::{
    ConversationEvent, ConversationGraph, ConversationGraphBuilder, ConversationSnapshot,
    ConversationStream,
};
pub use error::ConversationError;
pub use graph::{
    CompilationError, CompiledStateGraph, Next, Node, RetryPolicy, RunContext, RunOutcome,
    StateGraph, StateSnapshot, END, START,
};
pub use llm::{ChatOpenAI, LlmClient, LlmResponse, LlmUsage, MockLlm, ModelDelta};
pub use memory::{
    Checkpoint, CheckpointError, Checkpointer, JsonSerializer, MemorySaver, RunnableConfig,
    SqliteSaver,
};
pub use message::{Message, Role};
pub use prompts::{PromptLoadError, PromptRegistry, PromptTemplate};
pub use state::{ConversationState, Intake, NodePosition, ResumePatch, CHAT, USER_ACTION, WELCOME};
pub use stream::{ChunkToStreamSender, StreamEvent, StreamMode, TokenChunk};

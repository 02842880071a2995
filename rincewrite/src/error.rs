//! Conversation error types.
//!
//! Returned by graph runs, node handlers, and the conversation layer. Every
//! variant carries owned strings so errors can be cloned into stream events.

use thiserror::Error;

use crate::memory::CheckpointError;

/// Error raised while running or patching a conversation.
///
/// Node-level failures are caught at the graph boundary and reported as one of
/// these variants; none of them leaves the persisted state half-updated.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConversationError {
    /// The model call failed or timed out. Recoverable: retry the same node.
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    /// A prompt template is missing or invalid. Fatal at startup.
    #[error("prompt template resolution failed: {0}")]
    TemplateResolutionFailure(String),

    /// The checkpoint store could not be read or written.
    #[error("state store unavailable: {0}")]
    StoreUnavailable(String),

    /// A resume was attempted with a missing or malformed user message.
    #[error("invalid resume patch: {0}")]
    InvalidResumePatch(String),

    /// No persisted state for the thread.
    #[error("thread not found: {0}")]
    ThreadNotFound(String),

    /// A conversation is already stored under this thread id.
    #[error("thread already exists: {0}")]
    ThreadExists(String),

    /// The thread is not paused where the caller expected it to be.
    #[error("thread {thread_id} is not paused at the expected node (position: {position})")]
    NotPaused { thread_id: String, position: String },

    /// The run was cancelled before the current node completed.
    #[error("run cancelled")]
    Cancelled,

    /// Any other node failure.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
}

impl ConversationError {
    /// True when retrying the same operation may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ConversationError::ModelUnavailable(_)
                | ConversationError::StoreUnavailable(_)
                | ConversationError::Cancelled
        )
    }
}

impl From<CheckpointError> for ConversationError {
    fn from(err: CheckpointError) -> Self {
        ConversationError::StoreUnavailable(err.to_string())
    }
}

//! Run config: which thread (and optionally which checkpoint) a call targets.

/// Config for a single graph call.
///
/// A checkpointed graph requires `thread_id`. `checkpoint_id` pins reads to a
/// specific checkpoint instead of the latest one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunnableConfig {
    /// Unique id for this conversation thread.
    pub thread_id: Option<String>,
    /// Read this checkpoint instead of the latest.
    pub checkpoint_id: Option<String>,
    /// Optional namespace for checkpoints. Default is empty.
    pub checkpoint_ns: String,
}

impl RunnableConfig {
    /// Config scoped to one thread.
    pub fn for_thread(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: Some(thread_id.into()),
            ..Default::default()
        }
    }
}

//! Checkpoint and metadata types.
//!
//! A checkpoint is one persisted snapshot of a thread: the graph state plus the
//! node that runs next when the thread is resumed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source of the checkpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckpointSource {
    /// Written from the input of a fresh run, before the first node.
    #[default]
    Input,
    /// Written after a node completed inside the run loop.
    Loop,
    /// Written by a manual state update (`update_state`).
    Update,
}

impl CheckpointSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckpointSource::Input => "input",
            CheckpointSource::Loop => "loop",
            CheckpointSource::Update => "update",
        }
    }

    /// Inverse of [`as_str`](Self::as_str); unknown values read as `Update`.
    pub fn parse(s: &str) -> Self {
        match s {
            "input" => CheckpointSource::Input,
            "loop" => CheckpointSource::Loop,
            _ => CheckpointSource::Update,
        }
    }
}

/// Metadata for a single checkpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckpointMetadata {
    pub source: CheckpointSource,
    /// -1 for the input checkpoint, then one more per completed node.
    pub step: i64,
    pub created_at: Option<DateTime<Utc>>,
    /// Node whose output this checkpoint records (or the `as_node` of an update).
    pub writes: Option<String>,
}

/// One checkpoint: state snapshot, next node, id and timestamp.
///
/// Stored by a [`Checkpointer`](super::Checkpointer) keyed by
/// `(thread_id, checkpoint_ns, id)`.
#[derive(Debug, Clone)]
pub struct Checkpoint<S> {
    /// Unique id of the checkpoint.
    pub id: String,
    /// RFC 3339 creation timestamp.
    pub ts: String,
    /// Graph state at the time of the checkpoint.
    pub channel_values: S,
    /// Node to run on resume. `None` once the run reached END.
    pub next: Option<String>,
    pub metadata: CheckpointMetadata,
}

impl<S> Checkpoint<S> {
    /// Creates a checkpoint with a fresh id from the current state.
    pub fn from_state(
        state: S,
        next: Option<String>,
        source: CheckpointSource,
        step: i64,
        writes: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            ts: now.to_rfc3339(),
            channel_values: state,
            next,
            metadata: CheckpointMetadata {
                source,
                step,
                created_at: Some(now),
                writes,
            },
        }
    }
}

/// Item returned by `Checkpointer::list` for history views.
#[derive(Debug, Clone)]
pub struct CheckpointListItem {
    pub checkpoint_id: String,
    pub next: Option<String>,
    pub metadata: CheckpointMetadata,
}

//! Run context passed into nodes for streaming-aware execution.
//!
//! Holds the runnable config, optional stream sender, selected stream modes,
//! and the cancellation token of the run.

use std::collections::HashSet;
use std::fmt::Debug;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::memory::RunnableConfig;
use crate::stream::{ChunkToStreamSender, StreamEvent, StreamMode};

/// Run context passed into nodes for streaming-aware execution.
#[derive(Clone)]
pub struct RunContext<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    /// Config for the current run (thread_id, checkpoint).
    pub config: RunnableConfig,
    /// Optional sender for streaming events.
    pub stream_tx: Option<mpsc::Sender<StreamEvent<S>>>,
    /// Enabled stream modes.
    pub stream_mode: HashSet<StreamMode>,
    /// Cancelled by the caller to stop the run; the graph checks it between
    /// nodes and races it against node execution.
    pub cancel: CancellationToken,
}

impl<S> RunContext<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    pub fn new(config: RunnableConfig) -> Self {
        Self {
            config,
            stream_tx: None,
            stream_mode: HashSet::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Attaches a stream sender and the modes to emit.
    pub fn with_stream(
        mut self,
        tx: mpsc::Sender<StreamEvent<S>>,
        modes: HashSet<StreamMode>,
    ) -> Self {
        self.stream_tx = Some(tx);
        self.stream_mode = modes;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Checks if a specific stream mode is enabled.
    pub fn is_streaming_mode(&self, mode: StreamMode) -> bool {
        self.stream_mode.contains(&mode)
    }

    /// True when either mode is enabled; `Debug` implies checkpoints and tasks.
    pub(crate) fn wants(&self, mode: StreamMode) -> bool {
        self.stream_tx.is_some()
            && (self.is_streaming_mode(mode)
                || (matches!(mode, StreamMode::Checkpoints | StreamMode::Tasks)
                    && self.is_streaming_mode(StreamMode::Debug)))
    }

    /// Sends `event` when `mode` is enabled. Returns `true` if it was sent.
    pub(crate) async fn emit(&self, mode: StreamMode, event: StreamEvent<S>) -> bool {
        if !self.wants(mode) {
            return false;
        }
        match &self.stream_tx {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }

    /// Token adapter for `node_id` when `Messages` mode is enabled.
    pub fn token_sender(&self, node_id: &str) -> Option<ChunkToStreamSender<S>> {
        if !self.wants(StreamMode::Messages) {
            return None;
        }
        self.stream_tx
            .clone()
            .map(|tx| ChunkToStreamSender::new(tx, node_id))
    }
}

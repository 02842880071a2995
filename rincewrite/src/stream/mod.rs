//! Streaming types for graph runs.
//!
//! Defines stream modes, events, and the token adapter that turns raw model
//! deltas into token chunks. Used by `CompiledStateGraph::stream` and by nodes
//! that stream a model reply.
//!
//! Every stream produced by a run ends with exactly one terminal event:
//! [`StreamEvent::Interrupted`], [`StreamEvent::Finished`] or [`StreamEvent::Failed`].
//! Terminal events are sent regardless of the selected modes.

use std::fmt::Debug;

use tokio::sync::mpsc;

use crate::error::ConversationError;
use crate::llm::ModelDelta;

/// Stream mode selector: which kinds of events to emit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StreamMode {
    /// Emit full state after each node completes.
    Values,
    /// Emit incremental updates with node id and state.
    Updates,
    /// Emit token chunks (LLM streaming).
    Messages,
    /// Emit checkpoint events when checkpoints are written.
    Checkpoints,
    /// Emit task start/end events for each node execution.
    Tasks,
    /// Emit both checkpoints and tasks events.
    Debug,
}

/// Metadata attached to streamed tokens.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamMetadata {
    /// Node id that produced the token.
    pub node: String,
}

/// One chunk of streamed assistant text. Never empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenChunk {
    pub content: String,
}

impl TokenChunk {
    /// Token for a model delta: only non-empty `Content` produces one.
    pub fn from_delta(delta: ModelDelta) -> Option<TokenChunk> {
        match delta {
            ModelDelta::Content(content) if !content.is_empty() => Some(TokenChunk { content }),
            _ => None,
        }
    }
}

/// Checkpoint event emitted when a checkpoint is written.
#[derive(Clone, Debug)]
pub struct CheckpointEvent<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    pub checkpoint_id: String,
    pub timestamp: String,
    /// Step number in the graph execution (-1 for input, 0+ for loop).
    pub step: i64,
    /// Node the thread continues at, `None` after END.
    pub next: Option<String>,
    pub state: S,
    pub thread_id: Option<String>,
}

/// Streamed event emitted while running a graph.
#[derive(Clone, Debug)]
pub enum StreamEvent<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    /// Full state snapshot after a node finishes.
    Values(S),
    /// Node id and state after that node.
    Updates { node_id: String, state: S },
    /// Token emitted by a node while its model call streams.
    Messages {
        chunk: TokenChunk,
        metadata: StreamMetadata,
    },
    /// A checkpoint was written.
    Checkpoint(CheckpointEvent<S>),
    /// A node begins execution.
    TaskStart { node_id: String },
    /// A node finished: Ok(()) for success, Err(message) for failure.
    TaskEnd {
        node_id: String,
        result: Result<(), String>,
    },
    /// Terminal: the run paused before `node_id`.
    Interrupted { node_id: String, state: S },
    /// Terminal: the run reached END.
    Finished(S),
    /// Terminal: the run failed; persisted state is the last checkpoint before the failure.
    Failed(ConversationError),
}

impl<S> StreamEvent<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    /// True for `Interrupted`, `Finished` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamEvent::Interrupted { .. } | StreamEvent::Finished(_) | StreamEvent::Failed(_)
        )
    }
}

/// Adapter that converts [`ModelDelta`]s into `StreamEvent::Messages` and sends
/// them to `stream_tx`.
///
/// Call `channel()` to get (delta_tx, delta_rx), pass `delta_tx` to
/// `LlmClient::invoke_stream`, then await `forward_tokens(delta_rx)` alongside it
/// with `tokio::join!` so every token is forwarded before the node returns.
pub struct ChunkToStreamSender<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    stream_tx: mpsc::Sender<StreamEvent<S>>,
    node_id: String,
}

impl<S> ChunkToStreamSender<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    pub fn new(stream_tx: mpsc::Sender<StreamEvent<S>>, node_id: impl Into<String>) -> Self {
        Self {
            stream_tx,
            node_id: node_id.into(),
        }
    }

    /// Returns (delta_tx, delta_rx). Each model call gets a fresh pair.
    pub fn channel(&self) -> (mpsc::Sender<ModelDelta>, mpsc::Receiver<ModelDelta>) {
        mpsc::channel::<ModelDelta>(128)
    }

    /// Forwards non-empty content deltas from `delta_rx` as `StreamEvent::Messages`;
    /// tool-call fragments and usage are dropped. Completes when `delta_rx` is closed
    /// (i.e. when `invoke_stream` drops its sender). Returns the number of tokens sent.
    pub async fn forward_tokens(&self, mut delta_rx: mpsc::Receiver<ModelDelta>) -> usize {
        let mut sent = 0;
        while let Some(delta) = delta_rx.recv().await {
            let Some(chunk) = TokenChunk::from_delta(delta) else {
                continue;
            };
            let event = StreamEvent::Messages {
                chunk,
                metadata: StreamMetadata {
                    node: self.node_id.clone(),
                },
            };
            if self.stream_tx.send(event).await.is_ok() {
                sent += 1;
            }
        }
        sent
    }
}

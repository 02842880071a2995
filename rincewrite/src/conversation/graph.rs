//! The rincewrite conversation: welcome → user_action → chat → user_action …
//!
//! [`ConversationGraph`] compiles the four-node flow on a checkpointed
//! [`StateGraph`] with an interrupt before `user_action`, and exposes it as
//! `start` / `resume` / `snapshot` keyed by thread id. Each call returns a stream
//! of [`ConversationEvent`]s ending with exactly one `Paused` or `Failed`.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{BoxStream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::error::ConversationError;
use crate::graph::{CompiledStateGraph, RetryPolicy, StateGraph, START};
use crate::llm::LlmClient;
use crate::memory::{CheckpointListItem, Checkpointer, MemorySaver, RunnableConfig};
use crate::prompts::{PromptRegistry, CHAT_PROMPT, WELCOME_PROMPT};
use crate::state::{
    ConversationState, Intake, NodePosition, ResumePatch, CHAT, USER_ACTION, WELCOME,
};
use crate::stream::{StreamEvent, StreamMode};

use super::{ChatNode, UserActionNode, WelcomeNode};

/// Default bound on one model call.
pub const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(120);

/// Event yielded by `start` and `resume`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationEvent {
    /// One non-empty chunk of the reply being produced by `node`.
    Token { node: String, text: String },
    /// Terminal: the conversation is persisted and waiting at `position`.
    Paused {
        position: NodePosition,
        state: ConversationState,
    },
    /// Terminal: the call failed; the persisted thread is unchanged.
    Failed(ConversationError),
}

impl ConversationEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ConversationEvent::Token { .. })
    }

    fn from_stream_event(event: StreamEvent<ConversationState>) -> Option<Self> {
        match event {
            StreamEvent::Messages { chunk, metadata } => Some(ConversationEvent::Token {
                node: metadata.node,
                text: chunk.content,
            }),
            StreamEvent::Interrupted { node_id, state } => Some(match node_id.parse() {
                Ok(position) => ConversationEvent::Paused { position, state },
                Err(e) => ConversationEvent::Failed(ConversationError::ExecutionFailed(e)),
            }),
            StreamEvent::Finished(_) => Some(ConversationEvent::Failed(
                ConversationError::ExecutionFailed("conversation graph reached END".into()),
            )),
            StreamEvent::Failed(e) => Some(ConversationEvent::Failed(e)),
            _ => None,
        }
    }
}

/// Stream returned by [`ConversationGraph::start`] and [`ConversationGraph::resume`].
pub type ConversationStream = BoxStream<'static, ConversationEvent>;

/// Persisted view of one thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSnapshot {
    pub state: ConversationState,
    /// Node the thread continues at.
    pub position: NodePosition,
}

/// Builder for [`ConversationGraph`].
pub struct ConversationGraphBuilder {
    llm: Arc<dyn LlmClient>,
    prompts: Option<PromptRegistry>,
    checkpointer: Option<Arc<dyn Checkpointer<ConversationState>>>,
    model_timeout: Duration,
    store_retry_policy: RetryPolicy,
}

impl ConversationGraphBuilder {
    /// Prompt templates; embedded defaults when unset.
    pub fn prompts(mut self, prompts: PromptRegistry) -> Self {
        self.prompts = Some(prompts);
        self
    }

    /// Checkpoint store; a fresh [`MemorySaver`] when unset.
    pub fn checkpointer(mut self, checkpointer: Arc<dyn Checkpointer<ConversationState>>) -> Self {
        self.checkpointer = Some(checkpointer);
        self
    }

    pub fn model_timeout(mut self, timeout: Duration) -> Self {
        self.model_timeout = timeout;
        self
    }

    /// Backoff for checkpoint writes before `StoreUnavailable` is surfaced.
    pub fn store_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.store_retry_policy = policy;
        self
    }

    /// Resolves both templates and compiles the graph. A missing or invalid
    /// template fails here with `TemplateResolutionFailure`.
    pub fn build(self) -> Result<ConversationGraph, ConversationError> {
        let prompts = match self.prompts {
            Some(p) => p,
            None => PromptRegistry::embedded()?,
        };
        let welcome = prompts.resolve(WELCOME_PROMPT)?;
        let chat = prompts.resolve(CHAT_PROMPT)?;
        let checkpointer: Arc<dyn Checkpointer<ConversationState>> = match self.checkpointer {
            Some(cp) => cp,
            None => Arc::new(MemorySaver::<ConversationState>::new()),
        };

        let mut graph = StateGraph::<ConversationState>::new()
            .with_interrupt_before([USER_ACTION])
            .with_store_retry_policy(self.store_retry_policy);
        graph
            .add_node(
                WELCOME,
                Arc::new(WelcomeNode::new(
                    self.llm.clone(),
                    welcome,
                    self.model_timeout,
                )),
            )
            .add_node(USER_ACTION, Arc::new(UserActionNode))
            .add_node(
                CHAT,
                Arc::new(ChatNode::new(self.llm, chat, self.model_timeout)),
            )
            .add_edge(START, WELCOME)
            .add_edge(WELCOME, USER_ACTION)
            .add_edge(USER_ACTION, CHAT)
            .add_edge(CHAT, USER_ACTION);

        let graph = graph
            .compile_with_checkpointer(checkpointer)
            .map_err(|e| ConversationError::ExecutionFailed(e.to_string()))?;
        Ok(ConversationGraph { graph })
    }
}

/// The compiled conversation flow.
///
/// Cheap to clone; clones share the checkpoint store and the per-thread locks.
#[derive(Clone)]
pub struct ConversationGraph {
    graph: CompiledStateGraph<ConversationState>,
}

impl ConversationGraph {
    pub fn builder(llm: Arc<dyn LlmClient>) -> ConversationGraphBuilder {
        ConversationGraphBuilder {
            llm,
            prompts: None,
            checkpointer: None,
            model_timeout: DEFAULT_MODEL_TIMEOUT,
            store_retry_policy: RetryPolicy::store_default(),
        }
    }

    /// Embedded prompts, in-memory store, default timeout.
    pub fn new(llm: Arc<dyn LlmClient>) -> Result<Self, ConversationError> {
        Self::builder(llm).build()
    }

    /// Starts a conversation on `thread_id` from the intake: runs `welcome` and
    /// pauses before `user_action`. Fails with `ThreadExists` if the thread
    /// already has state. A start that loses a race with another start on the
    /// same thread ends its stream with `Failed(ThreadExists)` and writes nothing.
    pub async fn start(
        &self,
        thread_id: &str,
        intake: Intake,
    ) -> Result<ConversationStream, ConversationError> {
        self.start_with_cancel(thread_id, intake, CancellationToken::new())
            .await
    }

    /// [`start`](Self::start) that stops with `Failed(Cancelled)` once `cancel` fires.
    pub async fn start_with_cancel(
        &self,
        thread_id: &str,
        intake: Intake,
        cancel: CancellationToken,
    ) -> Result<ConversationStream, ConversationError> {
        let config = RunnableConfig::for_thread(thread_id);
        if self.graph.get_state(&config).await?.is_some() {
            return Err(ConversationError::ThreadExists(thread_id.to_string()));
        }
        tracing::info!(thread_id, piece = %intake.piece_name, "conversation start");
        let events = self.graph.stream_new_thread(
            intake.into(),
            config,
            [StreamMode::Messages],
            cancel,
        );
        Ok(events
            .filter_map(|e| futures::future::ready(ConversationEvent::from_stream_event(e)))
            .boxed())
    }

    /// Appends the patch at the interrupt point and runs `chat`, pausing again
    /// before `user_action`.
    ///
    /// The patch is validated before the store is touched (`InvalidResumePatch`).
    /// A thread that is missing or not paused at `user_action` ends the stream with
    /// `Failed(ThreadNotFound | NotPaused)`. If `chat` fails, nothing is persisted:
    /// the same patch can be resubmitted.
    pub async fn resume(
        &self,
        thread_id: &str,
        patch: ResumePatch,
    ) -> Result<ConversationStream, ConversationError> {
        self.resume_with_cancel(thread_id, patch, CancellationToken::new())
            .await
    }

    /// [`resume`](Self::resume) that stops with `Failed(Cancelled)` once `cancel` fires.
    pub async fn resume_with_cancel(
        &self,
        thread_id: &str,
        patch: ResumePatch,
        cancel: CancellationToken,
    ) -> Result<ConversationStream, ConversationError> {
        patch.validate()?;
        tracing::info!(thread_id, messages = patch.messages.len(), "conversation resume");
        let events = self.graph.stream_with_update(
            RunnableConfig::for_thread(thread_id),
            USER_ACTION,
            move |state| patch.apply(state),
            [StreamMode::Messages],
            cancel,
        );
        Ok(events
            .filter_map(|e| futures::future::ready(ConversationEvent::from_stream_event(e)))
            .boxed())
    }

    /// Latest persisted state and position of the thread.
    pub async fn snapshot(
        &self,
        thread_id: &str,
    ) -> Result<Option<ConversationSnapshot>, ConversationError> {
        let Some(snapshot) = self
            .graph
            .get_state(&RunnableConfig::for_thread(thread_id))
            .await?
        else {
            return Ok(None);
        };
        let next = snapshot.next.ok_or_else(|| {
            ConversationError::ExecutionFailed(format!("thread {} has no next node", thread_id))
        })?;
        let position = next.parse().map_err(ConversationError::ExecutionFailed)?;
        Ok(Some(ConversationSnapshot {
            state: snapshot.values,
            position,
        }))
    }

    /// Checkpoints of the thread, oldest first; `limit` keeps the newest `n`.
    pub async fn history(
        &self,
        thread_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<CheckpointListItem>, ConversationError> {
        self.graph
            .get_state_history(&RunnableConfig::for_thread(thread_id), limit)
            .await
    }
}

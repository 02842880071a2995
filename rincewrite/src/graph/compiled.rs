//! Compiled state graph: immutable, supports invoke, resume and stream.
//!
//! Built by `StateGraph::compile` or `compile_with_checkpointer`. Holds nodes,
//! the successor map derived from explicit edges, interrupt points, and an
//! optional checkpointer. With a checkpointer and `config.thread_id`, a
//! checkpoint is written after every completed node, so a thread can be resumed
//! from where it stopped.
//!
//! Runs on the same thread are serialized by a per-thread async mutex; runs on
//! different threads proceed concurrently.

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{mpsc, Mutex, OwnedMutexGuard};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::error::ConversationError;
use crate::memory::{
    Checkpoint, CheckpointListItem, CheckpointSource, Checkpointer, RunnableConfig,
};
use crate::stream::{CheckpointEvent, StreamEvent, StreamMode};

use super::logging::{
    log_checkpoint_saved, log_graph_complete, log_graph_error, log_graph_start, log_interrupt,
    log_node_complete, log_node_retry, log_node_start, log_node_state,
};
use super::retry::RetryPolicy;
use super::state_graph::END;
use super::{Next, Node, RunContext};

/// How a run ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome<S> {
    /// The run paused before `node_id`; the state is persisted with `next = node_id`.
    Interrupted { node_id: String, state: S },
    /// The run reached END.
    Finished(S),
}

impl<S> RunOutcome<S> {
    pub fn state(&self) -> &S {
        match self {
            RunOutcome::Interrupted { state, .. } => state,
            RunOutcome::Finished(state) => state,
        }
    }

    pub fn into_state(self) -> S {
        match self {
            RunOutcome::Interrupted { state, .. } => state,
            RunOutcome::Finished(state) => state,
        }
    }

    /// Node the run paused before, if it was interrupted.
    pub fn interrupted_at(&self) -> Option<&str> {
        match self {
            RunOutcome::Interrupted { node_id, .. } => Some(node_id),
            RunOutcome::Finished(_) => None,
        }
    }
}

/// Latest persisted state of a thread.
#[derive(Debug, Clone, PartialEq)]
pub struct StateSnapshot<S> {
    pub values: S,
    /// Node that runs on resume; `None` once the thread reached END.
    pub next: Option<String>,
    pub step: i64,
    pub checkpoint_id: String,
    pub created_at: Option<DateTime<Utc>>,
}

type StateUpdate<S> = Box<dyn FnOnce(S) -> S + Send>;

/// Where a run starts.
enum Entry<S> {
    /// New input, from the first node.
    Fresh(S),
    /// New input on a thread that must not have state yet.
    Create(S),
    /// From the `next` node of the latest checkpoint.
    Resume,
    /// Patch the paused state, then continue at the successor of `as_node`.
    Update {
        as_node: String,
        update: StateUpdate<S>,
    },
}

/// Position of a run between nodes.
struct Cursor<S> {
    state: S,
    current: String,
    step: i64,
    /// Node the run may enter even though it is an interrupt point.
    resume_at: Option<String>,
    /// Checkpoint to write if the run pauses before any node completes.
    pending: Option<(CheckpointSource, Option<String>)>,
}

enum Prepared<S> {
    Run(Cursor<S>),
    Done(RunOutcome<S>),
}

/// Compiled graph: immutable structure.
///
/// Created by `StateGraph::compile()` or `compile_with_checkpointer()`. Runs from
/// the first node (fresh input) or from a thread's persisted `next` node, halts
/// before interrupt points, and checkpoints after each node.
#[derive(Clone)]
pub struct CompiledStateGraph<S> {
    pub(super) nodes: HashMap<String, Arc<dyn Node<S>>>,
    /// First node to run (from START).
    pub(super) first_node_id: String,
    /// Outgoing edge of each node; the target may be END.
    pub(super) next_map: HashMap<String, String>,
    pub(super) interrupt_before: HashSet<String>,
    pub(super) checkpointer: Option<Arc<dyn Checkpointer<S>>>,
    /// Retry policy for node execution.
    pub(super) retry_policy: RetryPolicy,
    /// Retry policy for checkpoint writes.
    pub(super) store_retry_policy: RetryPolicy,
    /// One async mutex per thread id.
    pub(super) thread_locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl<S> CompiledStateGraph<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    /// Id of the node entered from START.
    pub fn first_node_id(&self) -> &str {
        &self.first_node_id
    }

    /// Node that follows `node_id` along its edge; `None` for END or no edge.
    pub fn successor(&self, node_id: &str) -> Option<String> {
        self.next_map
            .get(node_id)
            .filter(|to| to.as_str() != END)
            .cloned()
    }

    fn require_thread(&self, config: &RunnableConfig) -> Result<String, ConversationError> {
        if self.checkpointer.is_none() {
            return Err(ConversationError::ExecutionFailed(
                "graph was compiled without a checkpointer".into(),
            ));
        }
        config
            .thread_id
            .clone()
            .ok_or_else(|| ConversationError::ExecutionFailed("thread_id required".into()))
    }

    async fn lock_thread(&self, config: &RunnableConfig) -> Option<OwnedMutexGuard<()>> {
        let thread_id = config.thread_id.as_ref()?;
        let lock = self
            .thread_locks
            .entry(thread_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        Some(lock.lock_owned().await)
    }

    async fn load(&self, config: &RunnableConfig) -> Result<Option<Checkpoint<S>>, ConversationError> {
        let Some(cp) = &self.checkpointer else {
            return Ok(None);
        };
        if config.thread_id.is_none() {
            return Ok(None);
        }
        Ok(cp.get_tuple(config).await?.map(|(checkpoint, _)| checkpoint))
    }

    /// Writes one checkpoint, retrying with the store retry policy. Returns the
    /// checkpoint id, or `None` when the call is not persisted (no checkpointer
    /// or no thread id).
    async fn persist(
        &self,
        ctx: &RunContext<S>,
        state: &S,
        next: Option<String>,
        source: CheckpointSource,
        step: i64,
        writes: Option<String>,
    ) -> Result<Option<String>, ConversationError> {
        let config = &ctx.config;
        let Some(cp) = &self.checkpointer else {
            return Ok(None);
        };
        if config.thread_id.is_none() {
            return Ok(None);
        }

        let checkpoint = Checkpoint::from_state(state.clone(), next, source, step, writes);
        let mut attempt = 0;
        loop {
            match cp.put(config, &checkpoint).await {
                Ok(_) => break,
                Err(e) if self.store_retry_policy.should_retry(attempt) => {
                    tracing::warn!(attempt, error = %e, "Checkpoint write failed; retrying");
                    tokio::time::sleep(self.store_retry_policy.delay(attempt)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        log_checkpoint_saved(&checkpoint.id, step, checkpoint.next.as_deref());
        ctx.emit(
            StreamMode::Checkpoints,
            StreamEvent::Checkpoint(CheckpointEvent {
                checkpoint_id: checkpoint.id.clone(),
                timestamp: checkpoint.ts.clone(),
                step,
                next: checkpoint.next.clone(),
                state: state.clone(),
                thread_id: config.thread_id.clone(),
            }),
        )
        .await;
        Ok(Some(checkpoint.id))
    }

    /// Execute a node with retry logic. Cancellation is never retried.
    async fn execute_node_with_retry(
        &self,
        node: Arc<dyn Node<S>>,
        state: S,
        ctx: &RunContext<S>,
    ) -> Result<(S, Next), ConversationError> {
        let mut attempt = 0;
        loop {
            match node.run_with_context(state.clone(), ctx).await {
                Ok(output) => return Ok(output),
                Err(ConversationError::Cancelled) => return Err(ConversationError::Cancelled),
                Err(e) if self.retry_policy.should_retry(attempt) => {
                    log_node_retry(node.id(), attempt, &e);
                    let delay = self.retry_policy.delay(attempt);
                    if delay > std::time::Duration::ZERO {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn fresh_cursor(&self, state: S) -> Prepared<S> {
        Prepared::Run(Cursor {
            state,
            current: self.first_node_id.clone(),
            step: -1,
            resume_at: None,
            pending: Some((CheckpointSource::Input, None)),
        })
    }

    async fn prepare(
        &self,
        entry: Entry<S>,
        ctx: &RunContext<S>,
    ) -> Result<Prepared<S>, ConversationError> {
        match entry {
            Entry::Fresh(state) => Ok(self.fresh_cursor(state)),
            Entry::Create(state) => {
                let thread_id = self.require_thread(&ctx.config)?;
                if self.load(&ctx.config).await?.is_some() {
                    return Err(ConversationError::ThreadExists(thread_id));
                }
                Ok(self.fresh_cursor(state))
            }
            Entry::Resume => {
                let thread_id = self.require_thread(&ctx.config)?;
                let checkpoint = self
                    .load(&ctx.config)
                    .await?
                    .ok_or(ConversationError::ThreadNotFound(thread_id))?;
                match checkpoint.next {
                    None => Ok(Prepared::Done(RunOutcome::Finished(
                        checkpoint.channel_values,
                    ))),
                    Some(next) => Ok(Prepared::Run(Cursor {
                        state: checkpoint.channel_values,
                        current: next.clone(),
                        step: checkpoint.metadata.step,
                        resume_at: Some(next),
                        pending: None,
                    })),
                }
            }
            Entry::Update { as_node, update } => {
                let thread_id = self.require_thread(&ctx.config)?;
                let checkpoint = self
                    .load(&ctx.config)
                    .await?
                    .ok_or_else(|| ConversationError::ThreadNotFound(thread_id.clone()))?;
                if checkpoint.next.as_deref() != Some(as_node.as_str()) {
                    return Err(ConversationError::NotPaused {
                        thread_id,
                        position: checkpoint.next.unwrap_or_else(|| END.to_string()),
                    });
                }
                let step = checkpoint.metadata.step;
                let state = update(checkpoint.channel_values);
                match self.successor(&as_node) {
                    None => {
                        self.persist(
                            ctx,
                            &state,
                            None,
                            CheckpointSource::Update,
                            step + 1,
                            Some(as_node),
                        )
                        .await?;
                        Ok(Prepared::Done(RunOutcome::Finished(state)))
                    }
                    Some(next) => Ok(Prepared::Run(Cursor {
                        state,
                        current: next.clone(),
                        step,
                        resume_at: Some(next),
                        pending: Some((CheckpointSource::Update, Some(as_node))),
                    })),
                }
            }
        }
    }

    /// Shared run loop: steps through nodes until an interrupt, END, or an error.
    async fn run_loop(
        &self,
        cursor: Cursor<S>,
        ctx: &RunContext<S>,
    ) -> Result<RunOutcome<S>, ConversationError> {
        let Cursor {
            mut state,
            mut current,
            mut step,
            mut resume_at,
            mut pending,
        } = cursor;

        loop {
            if ctx.cancel.is_cancelled() {
                return Err(ConversationError::Cancelled);
            }

            if self.interrupt_before.contains(&current)
                && resume_at.as_deref() != Some(current.as_str())
            {
                if let Some((source, writes)) = pending.take() {
                    self.persist(ctx, &state, Some(current.clone()), source, step, writes)
                        .await?;
                }
                log_interrupt(&current);
                return Ok(RunOutcome::Interrupted {
                    node_id: current,
                    state,
                });
            }
            resume_at = None;

            let node = self.nodes.get(&current).cloned().ok_or_else(|| {
                ConversationError::ExecutionFailed(format!("node not found: {}", current))
            })?;

            log_node_start(&current);
            log_node_state(&current, &state);
            ctx.emit(
                StreamMode::Tasks,
                StreamEvent::TaskStart {
                    node_id: current.clone(),
                },
            )
            .await;

            let result = tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => Err(ConversationError::Cancelled),
                r = self.execute_node_with_retry(node, state.clone(), ctx) => r,
            };

            let (new_state, next) = match result {
                Ok(output) => output,
                Err(e) => {
                    ctx.emit(
                        StreamMode::Tasks,
                        StreamEvent::TaskEnd {
                            node_id: current.clone(),
                            result: Err(e.to_string()),
                        },
                    )
                    .await;
                    return Err(e);
                }
            };

            ctx.emit(
                StreamMode::Tasks,
                StreamEvent::TaskEnd {
                    node_id: current.clone(),
                    result: Ok(()),
                },
            )
            .await;
            log_node_complete(&current, &next);

            state = new_state;
            step += 1;

            let next_id = match next {
                Next::End => None,
                Next::Node(id) if id == END => None,
                Next::Node(id) => Some(id),
                Next::Continue => self.successor(&current),
            };
            if let Some(id) = &next_id {
                if !self.nodes.contains_key(id) {
                    return Err(ConversationError::ExecutionFailed(format!(
                        "node not found: {}",
                        id
                    )));
                }
            }

            // The patch or input of this run is part of the state written here.
            pending = None;
            self.persist(
                ctx,
                &state,
                next_id.clone(),
                CheckpointSource::Loop,
                step,
                Some(current.clone()),
            )
            .await?;

            ctx.emit(StreamMode::Values, StreamEvent::Values(state.clone()))
                .await;
            ctx.emit(
                StreamMode::Updates,
                StreamEvent::Updates {
                    node_id: current.clone(),
                    state: state.clone(),
                },
            )
            .await;

            match next_id {
                None => return Ok(RunOutcome::Finished(state)),
                Some(id) => current = id,
            }
        }
    }

    async fn execute(
        &self,
        entry: Entry<S>,
        ctx: RunContext<S>,
    ) -> Result<RunOutcome<S>, ConversationError> {
        let _guard = self.lock_thread(&ctx.config).await;
        log_graph_start(ctx.config.thread_id.as_deref());

        let result = match self.prepare(entry, &ctx).await {
            Ok(Prepared::Done(outcome)) => Ok(outcome),
            Ok(Prepared::Run(cursor)) => self.run_loop(cursor, &ctx).await,
            Err(e) => Err(e),
        };

        match &result {
            Ok(_) => log_graph_complete(),
            Err(e) => log_graph_error(e),
        }
        result
    }

    fn entry_for(input: Option<S>) -> Entry<S> {
        match input {
            Some(state) => Entry::Fresh(state),
            None => Entry::Resume,
        }
    }

    /// Runs the graph.
    ///
    /// - `Some(input)`: fresh run from the first node.
    /// - `None`: resume the thread in `config` from its persisted `next` node. The
    ///   node a resume starts at runs even if it is an interrupt point.
    ///
    /// The run halts before any other interrupt point and returns
    /// `RunOutcome::Interrupted`. Nothing is persisted for a node that fails.
    pub async fn invoke(
        &self,
        input: Option<S>,
        config: Option<RunnableConfig>,
    ) -> Result<RunOutcome<S>, ConversationError> {
        let ctx = RunContext::new(config.unwrap_or_default());
        self.execute(Self::entry_for(input), ctx).await
    }

    /// Like [`invoke`](Self::invoke) with a caller-built context (e.g. a cancellation token).
    pub async fn invoke_with_context(
        &self,
        input: Option<S>,
        ctx: RunContext<S>,
    ) -> Result<RunOutcome<S>, ConversationError> {
        self.execute(Self::entry_for(input), ctx).await
    }

    /// Transactional resume: patches a thread paused at `as_node` and continues
    /// at the successor of `as_node`.
    ///
    /// Fails with `NotPaused` when the thread's `next` node is not `as_node`. The
    /// patched state is only persisted together with the first completed node (or
    /// at the next interrupt), so a failure leaves the stored thread untouched.
    pub async fn invoke_with_update<F>(
        &self,
        config: RunnableConfig,
        as_node: &str,
        update: F,
        cancel: CancellationToken,
    ) -> Result<RunOutcome<S>, ConversationError>
    where
        F: FnOnce(S) -> S + Send + 'static,
    {
        let ctx = RunContext::new(config).with_cancel(cancel);
        let entry = Entry::Update {
            as_node: as_node.to_string(),
            update: Box::new(update),
        };
        self.execute(entry, ctx).await
    }

    /// Standalone patch: one read-modify-write of the thread's latest state as if
    /// `as_node` had produced it. Writes an `Update` checkpoint whose `next` is the
    /// successor of `as_node`. Returns the new checkpoint id.
    pub async fn update_state<F>(
        &self,
        config: &RunnableConfig,
        as_node: &str,
        update: F,
    ) -> Result<String, ConversationError>
    where
        F: FnOnce(S) -> S + Send,
    {
        let thread_id = self.require_thread(config)?;
        if !self.nodes.contains_key(as_node) {
            return Err(ConversationError::ExecutionFailed(format!(
                "node not found: {}",
                as_node
            )));
        }

        let _guard = self.lock_thread(config).await;
        let checkpoint = self
            .load(config)
            .await?
            .ok_or_else(|| ConversationError::ThreadNotFound(thread_id.clone()))?;
        let state = update(checkpoint.channel_values);
        let ctx = RunContext::new(config.clone());
        self.persist(
            &ctx,
            &state,
            self.successor(as_node),
            CheckpointSource::Update,
            checkpoint.metadata.step + 1,
            Some(as_node.to_string()),
        )
        .await?
        .ok_or(ConversationError::ThreadNotFound(thread_id))
    }

    /// Latest state of the thread (or the checkpoint pinned by `config.checkpoint_id`).
    pub async fn get_state(
        &self,
        config: &RunnableConfig,
    ) -> Result<Option<StateSnapshot<S>>, ConversationError> {
        Ok(self.load(config).await?.map(|cp| StateSnapshot {
            values: cp.channel_values,
            next: cp.next,
            step: cp.metadata.step,
            checkpoint_id: cp.id,
            created_at: cp.metadata.created_at,
        }))
    }

    /// Checkpoint history of the thread, oldest first; `limit` keeps the newest `n`.
    pub async fn get_state_history(
        &self,
        config: &RunnableConfig,
        limit: Option<usize>,
    ) -> Result<Vec<CheckpointListItem>, ConversationError> {
        let Some(cp) = &self.checkpointer else {
            return Ok(Vec::new());
        };
        if config.thread_id.is_none() {
            return Ok(Vec::new());
        }
        Ok(cp.list(config, limit, None).await?)
    }

    fn spawn_stream(
        &self,
        entry: Entry<S>,
        config: RunnableConfig,
        stream_mode: HashSet<StreamMode>,
        cancel: CancellationToken,
    ) -> ReceiverStream<StreamEvent<S>> {
        let (tx, rx) = mpsc::channel(128);
        let graph = self.clone();
        let ctx = RunContext::new(config)
            .with_stream(tx.clone(), stream_mode)
            .with_cancel(cancel);

        tokio::spawn(async move {
            let terminal = match graph.execute(entry, ctx).await {
                Ok(RunOutcome::Interrupted { node_id, state }) => {
                    StreamEvent::Interrupted { node_id, state }
                }
                Ok(RunOutcome::Finished(state)) => StreamEvent::Finished(state),
                Err(e) => StreamEvent::Failed(e),
            };
            let _ = tx.send(terminal).await;
        });

        ReceiverStream::new(rx)
    }

    /// Streams a run (fresh when `input` is `Some`, resume otherwise).
    ///
    /// Emits events for the selected modes and always ends with exactly one
    /// terminal event.
    pub fn stream(
        &self,
        input: Option<S>,
        config: Option<RunnableConfig>,
        stream_mode: impl Into<HashSet<StreamMode>>,
    ) -> ReceiverStream<StreamEvent<S>> {
        self.spawn_stream(
            Self::entry_for(input),
            config.unwrap_or_default(),
            stream_mode.into(),
            CancellationToken::new(),
        )
    }

    /// [`stream`](Self::stream) that stops with `Failed(Cancelled)` once `cancel` fires.
    pub fn stream_with_cancel(
        &self,
        input: Option<S>,
        config: Option<RunnableConfig>,
        stream_mode: impl Into<HashSet<StreamMode>>,
        cancel: CancellationToken,
    ) -> ReceiverStream<StreamEvent<S>> {
        self.spawn_stream(
            Self::entry_for(input),
            config.unwrap_or_default(),
            stream_mode.into(),
            cancel,
        )
    }

    /// Fresh run that fails with `ThreadExists` when the thread in `config`
    /// already has a checkpoint. The check holds the thread lock for the whole
    /// run, so of two concurrent calls on one thread only the first one runs.
    pub fn stream_new_thread(
        &self,
        input: S,
        config: RunnableConfig,
        stream_mode: impl Into<HashSet<StreamMode>>,
        cancel: CancellationToken,
    ) -> ReceiverStream<StreamEvent<S>> {
        self.spawn_stream(Entry::Create(input), config, stream_mode.into(), cancel)
    }

    /// Streaming form of [`invoke_with_update`](Self::invoke_with_update).
    pub fn stream_with_update<F>(
        &self,
        config: RunnableConfig,
        as_node: &str,
        update: F,
        stream_mode: impl Into<HashSet<StreamMode>>,
        cancel: CancellationToken,
    ) -> ReceiverStream<StreamEvent<S>>
    where
        F: FnOnce(S) -> S + Send + 'static,
    {
        let entry = Entry::Update {
            as_node: as_node.to_string(),
            update: Box::new(update),
        };
        self.spawn_stream(entry, config, stream_mode.into(), cancel)
    }
}

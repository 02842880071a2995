//! Shared helpers for conversation integration tests: intake fixture, graph
//! builders, a stream drainer, and a checkpointer with injectable write failures.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;

use rincewrite::memory::{CheckpointListItem, CheckpointMetadata};
use rincewrite::{
    Checkpoint, CheckpointError, Checkpointer, ConversationEvent, ConversationGraph,
    ConversationState, ConversationStream, Intake, MemorySaver, MockLlm, RetryPolicy,
    RunnableConfig,
};

pub const WELCOME_REPLY: &str = "Welcome, Ada! Let's shape Dune Two together.";
pub const CHAT_REPLY: &str = "Chapter one: open on the desert at dawn.";

pub fn intake() -> Intake {
    Intake {
        piece_name: "Dune Two".into(),
        piece_description: "sequel outline".into(),
        user_name: "Ada".into(),
        user_description: "aspiring novelist".into(),
    }
}

/// Mock answering the welcome, then the chat reply for every later call.
pub fn scripted_llm() -> Arc<MockLlm> {
    Arc::new(MockLlm::with_replies(vec![
        WELCOME_REPLY.into(),
        CHAT_REPLY.into(),
    ]))
}

pub fn graph_with(llm: Arc<MockLlm>) -> ConversationGraph {
    ConversationGraph::builder(llm)
        .model_timeout(Duration::from_secs(5))
        .build()
        .expect("conversation graph builds")
}

/// Collects the streamed token text and the terminal event.
pub async fn drain(mut events: ConversationStream) -> (String, ConversationEvent) {
    let mut text = String::new();
    while let Some(event) = events.next().await {
        match event {
            ConversationEvent::Token { text: t, .. } => text.push_str(&t),
            terminal => return (text, terminal),
        }
    }
    panic!("stream ended without a terminal event");
}

/// Runs `start` to its terminal event.
pub async fn start(graph: &ConversationGraph, thread_id: &str) -> (String, ConversationEvent) {
    drain(graph.start(thread_id, intake()).await.expect("start accepted")).await
}

/// Runs `resume` with one message to its terminal event.
pub async fn say(
    graph: &ConversationGraph,
    thread_id: &str,
    text: &str,
) -> (String, ConversationEvent) {
    let events = graph
        .resume(thread_id, rincewrite::ResumePatch::message(text))
        .await
        .expect("patch accepted");
    drain(events).await
}

pub fn paused_state(event: ConversationEvent) -> ConversationState {
    match event {
        ConversationEvent::Paused { state, .. } => state,
        other => panic!("expected Paused, got {:?}", other),
    }
}

/// MemorySaver whose next `failures` writes fail with a storage error.
pub struct FlakySaver {
    inner: MemorySaver<ConversationState>,
    failures: AtomicUsize,
    pub puts: AtomicUsize,
}

impl FlakySaver {
    pub fn new(failures: usize) -> Self {
        Self {
            inner: MemorySaver::new(),
            failures: AtomicUsize::new(failures),
            puts: AtomicUsize::new(0),
        }
    }

    pub fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl Checkpointer<ConversationState> for FlakySaver {
    async fn put(
        &self,
        config: &RunnableConfig,
        checkpoint: &Checkpoint<ConversationState>,
    ) -> Result<String, CheckpointError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(CheckpointError::Storage("disk unavailable".into()));
        }
        self.inner.put(config, checkpoint).await
    }

    async fn get_tuple(
        &self,
        config: &RunnableConfig,
    ) -> Result<Option<(Checkpoint<ConversationState>, CheckpointMetadata)>, CheckpointError>
    {
        self.inner.get_tuple(config).await
    }

    async fn list(
        &self,
        config: &RunnableConfig,
        limit: Option<usize>,
        before: Option<&str>,
    ) -> Result<Vec<CheckpointListItem>, CheckpointError> {
        self.inner.list(config, limit, before).await
    }
}

/// Store retry short enough for tests.
pub fn fast_store_retry() -> RetryPolicy {
    RetryPolicy::fixed(2, Duration::from_millis(1))
}

//! Test state and nodes shared by the state graph tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use rincewrite::graph::{CompiledStateGraph, Next, Node, RunContext, StateGraph, START};
use rincewrite::memory::{Checkpointer, MemorySaver};
use rincewrite::{ConversationError, ModelDelta};

/// Running total plus the order nodes ran in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tally {
    pub total: i32,
    pub visited: Vec<String>,
}

impl Tally {
    pub fn visited(&self) -> Vec<&str> {
        self.visited.iter().map(String::as_str).collect()
    }
}

/// Adds `delta` and records its id.
pub struct AddNode {
    pub id: &'static str,
    pub delta: i32,
}

impl AddNode {
    pub fn arc(id: &'static str, delta: i32) -> Arc<Self> {
        Arc::new(Self { id, delta })
    }
}

#[async_trait]
impl Node<Tally> for AddNode {
    fn id(&self) -> &str {
        self.id
    }

    async fn run(&self, mut state: Tally) -> Result<(Tally, Next), ConversationError> {
        state.total += self.delta;
        state.visited.push(self.id.to_string());
        Ok((state, Next::Continue))
    }
}

/// Fails `failures` times, then behaves like an `AddNode` with delta 1.
pub struct FlakyNode {
    pub id: &'static str,
    failures: AtomicUsize,
    pub attempts: AtomicUsize,
}

impl FlakyNode {
    pub fn new(id: &'static str, failures: usize) -> Self {
        Self {
            id,
            failures: AtomicUsize::new(failures),
            attempts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Node<Tally> for FlakyNode {
    fn id(&self) -> &str {
        self.id
    }

    async fn run(&self, mut state: Tally) -> Result<(Tally, Next), ConversationError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ConversationError::ModelUnavailable("flaky".into()));
        }
        state.total += 1;
        state.visited.push(self.id.to_string());
        Ok((state, Next::Continue))
    }
}

/// Streams `text` char by char through the run context, then records its id.
pub struct SpeakingNode {
    pub id: &'static str,
    pub text: &'static str,
}

#[async_trait]
impl Node<Tally> for SpeakingNode {
    fn id(&self) -> &str {
        self.id
    }

    async fn run(&self, mut state: Tally) -> Result<(Tally, Next), ConversationError> {
        state.visited.push(self.id.to_string());
        Ok((state, Next::Continue))
    }

    async fn run_with_context(
        &self,
        state: Tally,
        ctx: &RunContext<Tally>,
    ) -> Result<(Tally, Next), ConversationError> {
        if let Some(sender) = ctx.token_sender(self.id) {
            let (tx, rx) = sender.channel();
            let produce = async move {
                for c in self.text.chars() {
                    let _ = tx.send(ModelDelta::Content(c.to_string())).await;
                }
            };
            tokio::join!(produce, sender.forward_tokens(rx));
        }
        self.run(state).await
    }
}

/// Waits until cancelled; never completes on its own.
pub struct StallNode;

#[async_trait]
impl Node<Tally> for StallNode {
    fn id(&self) -> &str {
        "stall"
    }

    async fn run(&self, state: Tally) -> Result<(Tally, Next), ConversationError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok((state, Next::Continue))
    }
}

pub fn saver() -> Arc<dyn Checkpointer<Tally>> {
    Arc::new(MemorySaver::<Tally>::new())
}

/// `START -> intro -> gate -> work -> gate`, paused before `gate`.
///
/// Mirrors the conversation loop: `intro` runs once, every resume patches
/// the state at `gate` and runs `work`.
pub fn looping_graph(checkpointer: Arc<dyn Checkpointer<Tally>>) -> CompiledStateGraph<Tally> {
    let mut graph = StateGraph::<Tally>::new().with_interrupt_before(["gate"]);
    graph
        .add_node("intro", AddNode::arc("intro", 1))
        .add_node("gate", AddNode::arc("gate", 0))
        .add_node("work", AddNode::arc("work", 10))
        .add_edge(START, "intro")
        .add_edge("intro", "gate")
        .add_edge("gate", "work")
        .add_edge("work", "gate");
    graph
        .compile_with_checkpointer(checkpointer)
        .expect("looping graph compiles")
}

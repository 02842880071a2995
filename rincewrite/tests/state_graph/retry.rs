//! Node retry policy.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use rincewrite::graph::{RetryPolicy, StateGraph, END, START};
use rincewrite::ConversationError;

use crate::common::{FlakyNode, Tally};

fn run_flaky(
    failures: usize,
    policy: RetryPolicy,
) -> (Arc<FlakyNode>, rincewrite::CompiledStateGraph<Tally>) {
    let node = Arc::new(FlakyNode::new("flaky", failures));
    let mut graph = StateGraph::<Tally>::new().with_retry_policy(policy);
    graph
        .add_node("flaky", node.clone())
        .add_edge(START, "flaky")
        .add_edge("flaky", END);
    (node, graph.compile().unwrap())
}

#[tokio::test]
async fn transient_failures_within_the_budget_are_retried() {
    let (node, graph) = run_flaky(2, RetryPolicy::fixed(2, Duration::from_millis(1)));
    let out = graph.invoke(Some(Tally::default()), None).await.unwrap();
    assert_eq!(out.state().total, 1);
    assert_eq!(node.attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn failures_beyond_the_budget_surface() {
    let (node, graph) = run_flaky(
        5,
        RetryPolicy::exponential(1, Duration::from_millis(1), Duration::from_millis(5), 2.0),
    );
    let err = graph
        .invoke(Some(Tally::default()), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ConversationError::ModelUnavailable(_)));
    assert_eq!(node.attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn no_policy_means_a_single_attempt() {
    let (node, graph) = run_flaky(1, RetryPolicy::none());
    assert!(graph.invoke(Some(Tally::default()), None).await.is_err());
    assert_eq!(node.attempts.load(Ordering::SeqCst), 1);
}

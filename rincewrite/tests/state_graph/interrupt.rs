//! Interrupt points, resume, and state patches against a checkpointed thread.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use rincewrite::graph::{RunOutcome, StateGraph, END, START};
use rincewrite::memory::{CheckpointSource, RunnableConfig};
use rincewrite::ConversationError;

use crate::common::{looping_graph, saver, AddNode, FlakyNode, Tally};

fn add(n: i32) -> impl FnOnce(Tally) -> Tally + Send + 'static {
    move |mut s: Tally| {
        s.total += n;
        s
    }
}

#[tokio::test]
async fn fresh_run_pauses_before_interrupt_point() {
    let graph = looping_graph(saver());
    let config = RunnableConfig::for_thread("t1");

    let out = graph
        .invoke(Some(Tally::default()), Some(config.clone()))
        .await
        .unwrap();
    assert_eq!(out.interrupted_at(), Some("gate"));
    assert_eq!(out.state().visited(), vec!["intro"]);

    let snapshot = graph.get_state(&config).await.unwrap().unwrap();
    assert_eq!(snapshot.next.as_deref(), Some("gate"));
    assert_eq!(snapshot.step, 0);
    assert_eq!(snapshot.values.total, 1);
}

/// **Scenario**: plain resume enters the paused node even though it is an interrupt point.
#[tokio::test]
async fn resume_runs_the_paused_node_and_pauses_again() {
    let graph = looping_graph(saver());
    let config = RunnableConfig::for_thread("t1");
    graph
        .invoke(Some(Tally::default()), Some(config.clone()))
        .await
        .unwrap();

    let out = graph.invoke(None, Some(config.clone())).await.unwrap();
    assert_eq!(out.interrupted_at(), Some("gate"));
    assert_eq!(out.state().visited(), vec!["intro", "gate", "work"]);
    assert_eq!(out.state().total, 11);
    assert_eq!(graph.get_state(&config).await.unwrap().unwrap().step, 2);
}

#[tokio::test]
async fn invoke_with_update_patches_and_skips_the_paused_node() {
    let graph = looping_graph(saver());
    let config = RunnableConfig::for_thread("t1");
    graph
        .invoke(Some(Tally::default()), Some(config.clone()))
        .await
        .unwrap();

    let out = graph
        .invoke_with_update(config.clone(), "gate", add(100), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(out.interrupted_at(), Some("gate"));
    assert_eq!(out.state().visited(), vec!["intro", "work"]);
    assert_eq!(out.state().total, 111);

    let history = graph.get_state_history(&config, None).await.unwrap();
    let writes: Vec<_> = history
        .iter()
        .map(|h| h.metadata.writes.as_deref().unwrap_or(""))
        .collect();
    assert_eq!(writes, vec!["intro", "work"]);
    assert!(history
        .iter()
        .all(|h| h.metadata.source == CheckpointSource::Loop));
    assert_eq!(history[1].metadata.step, 1);
}

#[tokio::test]
async fn invoke_with_update_requires_the_thread_to_be_paused_there() {
    let graph = looping_graph(saver());
    let config = RunnableConfig::for_thread("t1");
    graph
        .invoke(Some(Tally::default()), Some(config.clone()))
        .await
        .unwrap();

    let err = graph
        .invoke_with_update(config, "work", add(1), CancellationToken::new())
        .await
        .unwrap_err();
    match err {
        ConversationError::NotPaused {
            thread_id,
            position,
        } => {
            assert_eq!(thread_id, "t1");
            assert_eq!(position, "gate");
        }
        other => panic!("expected NotPaused, got {:?}", other),
    }
}

#[tokio::test]
async fn invoke_with_update_on_unknown_thread_fails() {
    let graph = looping_graph(saver());
    let err = graph
        .invoke_with_update(
            RunnableConfig::for_thread("nobody"),
            "gate",
            add(1),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ConversationError::ThreadNotFound(ref t) if t == "nobody"));
}

/// **Scenario**: a node failing after a patch leaves the stored thread as it was;
/// retrying the same patch applies it exactly once.
#[tokio::test]
async fn failed_update_run_persists_nothing() {
    let checkpointer = saver();
    let mut graph = StateGraph::<Tally>::new().with_interrupt_before(["gate"]);
    graph
        .add_node("intro", AddNode::arc("intro", 1))
        .add_node("gate", AddNode::arc("gate", 0))
        .add_node("flaky", Arc::new(FlakyNode::new("flaky", 1)))
        .add_edge(START, "intro")
        .add_edge("intro", "gate")
        .add_edge("gate", "flaky")
        .add_edge("flaky", "gate");
    let graph = graph.compile_with_checkpointer(checkpointer).unwrap();
    let config = RunnableConfig::for_thread("t1");
    graph
        .invoke(Some(Tally::default()), Some(config.clone()))
        .await
        .unwrap();
    let before = graph.get_state(&config).await.unwrap().unwrap();

    let err = graph
        .invoke_with_update(config.clone(), "gate", add(100), CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ConversationError::ModelUnavailable(_)));
    let after = graph.get_state(&config).await.unwrap().unwrap();
    assert_eq!(after.checkpoint_id, before.checkpoint_id);
    assert_eq!(after.values, before.values);

    let out = graph
        .invoke_with_update(config, "gate", add(100), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(out.state().total, 102);
    assert_eq!(out.state().visited(), vec!["intro", "flaky"]);
}

#[tokio::test]
async fn update_state_writes_an_update_checkpoint() {
    let graph = looping_graph(saver());
    let config = RunnableConfig::for_thread("t1");
    graph
        .invoke(Some(Tally::default()), Some(config.clone()))
        .await
        .unwrap();

    let id = graph.update_state(&config, "gate", add(5)).await.unwrap();
    let snapshot = graph.get_state(&config).await.unwrap().unwrap();
    assert_eq!(snapshot.checkpoint_id, id);
    assert_eq!(snapshot.next.as_deref(), Some("work"));
    assert_eq!(snapshot.step, 1);
    assert_eq!(snapshot.values.total, 6);

    let history = graph.get_state_history(&config, None).await.unwrap();
    let last = history.last().unwrap();
    assert_eq!(last.metadata.source, CheckpointSource::Update);
    assert_eq!(last.metadata.writes.as_deref(), Some("gate"));

    let out = graph.invoke(None, Some(config)).await.unwrap();
    assert_eq!(out.state().visited(), vec!["intro", "work"]);
    assert_eq!(out.state().total, 16);
}

#[tokio::test]
async fn update_state_on_unknown_node_fails() {
    let graph = looping_graph(saver());
    let config = RunnableConfig::for_thread("t1");
    graph
        .invoke(Some(Tally::default()), Some(config.clone()))
        .await
        .unwrap();
    let err = graph
        .update_state(&config, "ghost", add(1))
        .await
        .unwrap_err();
    assert!(matches!(err, ConversationError::ExecutionFailed(_)));
}

/// **Scenario**: pausing before the very first node stores the input at step -1;
/// a finished thread resumes to its final state without running anything.
#[tokio::test]
async fn interrupt_before_first_node_stores_the_input() {
    let mut graph = StateGraph::<Tally>::new().with_interrupt_before(["only"]);
    graph
        .add_node("only", AddNode::arc("only", 3))
        .add_edge(START, "only")
        .add_edge("only", END);
    let graph = graph.compile_with_checkpointer(saver()).unwrap();
    let config = RunnableConfig::for_thread("t1");

    let out = graph
        .invoke(Some(Tally::default()), Some(config.clone()))
        .await
        .unwrap();
    assert_eq!(out.interrupted_at(), Some("only"));
    let history = graph.get_state_history(&config, None).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].metadata.source, CheckpointSource::Input);
    assert_eq!(history[0].metadata.step, -1);

    let out = graph.invoke(None, Some(config.clone())).await.unwrap();
    assert!(matches!(&out, RunOutcome::Finished(s) if s.total == 3));
    assert_eq!(graph.get_state(&config).await.unwrap().unwrap().next, None);

    let again = graph.invoke(None, Some(config.clone())).await.unwrap();
    assert_eq!(again, out);
    assert_eq!(graph.get_state_history(&config, None).await.unwrap().len(), 2);
}

#[tokio::test]
async fn history_limit_keeps_the_newest_checkpoints() {
    let graph = looping_graph(saver());
    let config = RunnableConfig::for_thread("t1");
    graph
        .invoke(Some(Tally::default()), Some(config.clone()))
        .await
        .unwrap();
    graph.invoke(None, Some(config.clone())).await.unwrap();

    let all = graph.get_state_history(&config, None).await.unwrap();
    let steps: Vec<i64> = all.iter().map(|h| h.metadata.step).collect();
    assert_eq!(steps, vec![0, 1, 2]);

    let newest = graph.get_state_history(&config, Some(2)).await.unwrap();
    let steps: Vec<i64> = newest.iter().map(|h| h.metadata.step).collect();
    assert_eq!(steps, vec![1, 2]);
}

//! Streaming runs: per-mode events and the single terminal event.

use std::collections::HashSet;
use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use rincewrite::graph::{StateGraph, END, START};
use rincewrite::memory::RunnableConfig;
use rincewrite::stream::{StreamEvent, StreamMode};
use rincewrite::ConversationError;

use crate::common::{saver, AddNode, SpeakingNode, StallNode, Tally};

fn speaking_graph() -> rincewrite::CompiledStateGraph<Tally> {
    let mut graph = StateGraph::<Tally>::new();
    graph
        .add_node("count", AddNode::arc("count", 2))
        .add_node(
            "speak",
            Arc::new(SpeakingNode {
                id: "speak",
                text: "hi!",
            }),
        )
        .add_edge(START, "count")
        .add_edge("count", "speak")
        .add_edge("speak", END);
    graph.compile_with_checkpointer(saver()).unwrap()
}

fn label(event: &StreamEvent<Tally>) -> String {
    match event {
        StreamEvent::Values(_) => "values".into(),
        StreamEvent::Updates { node_id, .. } => format!("update:{}", node_id),
        StreamEvent::Messages { .. } => "token".into(),
        StreamEvent::Checkpoint(cp) => format!("checkpoint:{}", cp.step),
        StreamEvent::TaskStart { node_id } => format!("start:{}", node_id),
        StreamEvent::TaskEnd { node_id, result } => {
            format!("end:{}:{}", node_id, if result.is_ok() { "ok" } else { "err" })
        }
        StreamEvent::Interrupted { node_id, .. } => format!("interrupted:{}", node_id),
        StreamEvent::Finished(_) => "finished".into(),
        StreamEvent::Failed(_) => "failed".into(),
    }
}

#[tokio::test]
async fn all_modes_report_each_node_in_order() {
    let graph = speaking_graph();
    let events: Vec<_> = graph
        .stream(
            Some(Tally::default()),
            Some(RunnableConfig::for_thread("t1")),
            [
                StreamMode::Values,
                StreamMode::Updates,
                StreamMode::Messages,
                StreamMode::Checkpoints,
                StreamMode::Tasks,
            ],
        )
        .collect()
        .await;

    let labels: Vec<String> = events.iter().map(label).collect();
    assert_eq!(
        labels,
        vec![
            "start:count",
            "end:count:ok",
            "checkpoint:0",
            "values",
            "update:count",
            "start:speak",
            "token",
            "token",
            "token",
            "end:speak:ok",
            "checkpoint:1",
            "values",
            "update:speak",
            "finished",
        ]
    );

    let text: String = events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::Messages { chunk, metadata } => {
                assert_eq!(metadata.node, "speak");
                Some(chunk.content.as_str())
            }
            _ => None,
        })
        .collect();
    assert_eq!(text, "hi!");
}

/// **Scenario**: Debug turns on task and checkpoint events, nothing else.
#[tokio::test]
async fn debug_mode_implies_tasks_and_checkpoints() {
    let graph = speaking_graph();
    let events: Vec<_> = graph
        .stream(
            Some(Tally::default()),
            Some(RunnableConfig::for_thread("t1")),
            [StreamMode::Debug],
        )
        .collect()
        .await;
    assert!(events
        .iter()
        .any(|e| matches!(e, StreamEvent::TaskStart { .. })));
    assert!(events
        .iter()
        .any(|e| matches!(e, StreamEvent::Checkpoint(_))));
    assert!(!events.iter().any(|e| matches!(
        e,
        StreamEvent::Values(_) | StreamEvent::Updates { .. } | StreamEvent::Messages { .. }
    )));
}

#[tokio::test]
async fn without_modes_only_the_terminal_event_arrives() {
    let graph = speaking_graph();
    let events: Vec<_> = graph
        .stream(Some(Tally::default()), None, HashSet::<StreamMode>::new())
        .collect()
        .await;
    assert_eq!(events.len(), 1);
    match &events[0] {
        StreamEvent::Finished(state) => {
            assert_eq!(state.total, 2);
            assert_eq!(state.visited(), vec!["count", "speak"]);
        }
        other => panic!("expected Finished, got {}", label(other)),
    }
}

#[tokio::test]
async fn resuming_an_unknown_thread_streams_a_failure() {
    let graph = speaking_graph();
    let events: Vec<_> = graph
        .stream(
            None,
            Some(RunnableConfig::for_thread("nobody")),
            [StreamMode::Tasks],
        )
        .collect()
        .await;
    assert_eq!(events.len(), 1);
    assert!(matches!(
        &events[0],
        StreamEvent::Failed(ConversationError::ThreadNotFound(t)) if t == "nobody"
    ));
}

/// **Scenario**: cancelling while a node runs ends the stream with `Cancelled`
/// and keeps the checkpoint written before that node.
#[tokio::test]
async fn cancel_stops_a_running_node() {
    let mut graph = StateGraph::<Tally>::new();
    graph
        .add_node("count", AddNode::arc("count", 1))
        .add_node("stall", Arc::new(StallNode))
        .add_edge(START, "count")
        .add_edge("count", "stall")
        .add_edge("stall", END);
    let graph = graph.compile_with_checkpointer(saver()).unwrap();
    let config = RunnableConfig::for_thread("t1");
    let cancel = CancellationToken::new();

    let mut events = graph.stream_with_cancel(
        Some(Tally::default()),
        Some(config.clone()),
        [StreamMode::Tasks],
        cancel.clone(),
    );
    let mut terminal = None;
    while let Some(event) = events.next().await {
        match event {
            StreamEvent::TaskStart { node_id } if node_id == "stall" => cancel.cancel(),
            e if e.is_terminal() => terminal = Some(e),
            _ => {}
        }
    }
    assert!(matches!(
        terminal,
        Some(StreamEvent::Failed(ConversationError::Cancelled))
    ));

    let snapshot = graph.get_state(&config).await.unwrap().unwrap();
    assert_eq!(snapshot.next.as_deref(), Some("stall"));
    assert_eq!(snapshot.values.visited(), vec!["count"]);
}

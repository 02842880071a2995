//! Graph validation at compile time.

use rincewrite::graph::{CompilationError, StateGraph, END, START};

use crate::common::{AddNode, Tally};

fn graph_with(ids: &[&'static str]) -> StateGraph<Tally> {
    let mut graph = StateGraph::<Tally>::new();
    for id in ids {
        graph.add_node(*id, AddNode::arc(id, 1));
    }
    graph
}

#[test]
fn edge_to_unknown_node_is_rejected() {
    let mut graph = graph_with(&["a"]);
    graph.add_edge(START, "a").add_edge("a", "ghost");
    match graph.compile() {
        Err(CompilationError::NodeNotFound(id)) => assert_eq!(id, "ghost"),
        other => panic!("expected NodeNotFound, got {:?}", other.err()),
    }
}

#[test]
fn missing_start_edge_is_rejected() {
    let mut graph = graph_with(&["a"]);
    graph.add_edge("a", END);
    assert!(matches!(graph.compile(), Err(CompilationError::MissingStart)));
}

#[test]
fn two_start_edges_are_rejected() {
    let mut graph = graph_with(&["a", "b"]);
    graph
        .add_edge(START, "a")
        .add_edge(START, "b")
        .add_edge("a", END)
        .add_edge("b", END);
    match graph.compile() {
        Err(CompilationError::MultipleStart(targets)) => {
            assert_eq!(targets, vec!["a".to_string(), "b".to_string()])
        }
        other => panic!("expected MultipleStart, got {:?}", other.err()),
    }
}

#[test]
fn second_outgoing_edge_is_rejected() {
    let mut graph = graph_with(&["a", "b"]);
    graph
        .add_edge(START, "a")
        .add_edge("a", "b")
        .add_edge("a", END)
        .add_edge("b", END);
    match graph.compile() {
        Err(CompilationError::DuplicateEdge(from)) => assert_eq!(from, "a"),
        other => panic!("expected DuplicateEdge, got {:?}", other.err()),
    }
}

#[test]
fn interrupt_on_unknown_node_is_rejected() {
    let mut graph = graph_with(&["a"]).with_interrupt_before(["review"]);
    graph.add_edge(START, "a").add_edge("a", END);
    match graph.compile() {
        Err(CompilationError::UnknownInterruptNode(id)) => assert_eq!(id, "review"),
        other => panic!("expected UnknownInterruptNode, got {:?}", other.err()),
    }
}

/// **Scenario**: a loop with no interrupt point would never yield control.
#[test]
fn cycle_without_interrupt_is_rejected() {
    let mut graph = graph_with(&["a", "b"]);
    graph
        .add_edge(START, "a")
        .add_edge("a", "b")
        .add_edge("b", "a");
    match graph.compile() {
        Err(CompilationError::CycleWithoutInterrupt(cycle)) => {
            assert_eq!(cycle.first(), cycle.last());
            assert!(cycle.contains(&"a".to_string()) && cycle.contains(&"b".to_string()));
        }
        other => panic!("expected CycleWithoutInterrupt, got {:?}", other.err()),
    }
}

#[test]
fn cycle_through_an_interrupt_point_compiles() {
    let mut graph = graph_with(&["a", "b"]).with_interrupt_before(["b"]);
    graph
        .add_edge(START, "a")
        .add_edge("a", "b")
        .add_edge("b", "a");
    let compiled = graph.compile().expect("interrupted cycle is valid");
    assert_eq!(compiled.first_node_id(), "a");
    assert_eq!(compiled.successor("b").as_deref(), Some("a"));
}

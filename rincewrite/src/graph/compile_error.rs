//! Graph compilation error.
//!
//! Returned by `StateGraph::compile` when edges reference unknown nodes, the
//! entry is ambiguous, or a loop could never pause.

use thiserror::Error;

/// Error when compiling a state graph.
///
/// Validation ensures every id in edges (except START/END) exists in the node
/// map, there is exactly one edge from START, each node has at most one
/// outgoing edge, every interrupt id names a node, and every cycle passes
/// through an interrupt point.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompilationError {
    /// A node id in an edge was not registered via `add_node` (and is not START/END).
    #[error("node not found: {0}")]
    NodeNotFound(String),

    /// No edge has from_id == START.
    #[error("graph must have exactly one edge from START")]
    MissingStart,

    /// More than one edge leaves START.
    #[error("graph has more than one edge from START: {0:?}")]
    MultipleStart(Vec<String>),

    /// A node has more than one outgoing edge.
    #[error("node has more than one outgoing edge: {0}")]
    DuplicateEdge(String),

    /// An `interrupt_before` id is not a registered node.
    #[error("interrupt node not found: {0}")]
    UnknownInterruptNode(String),

    /// A cycle contains no interrupt point, so a run entering it would never pause.
    #[error("cycle without interrupt point: {}", .0.join(" -> "))]
    CycleWithoutInterrupt(Vec<String>),
}

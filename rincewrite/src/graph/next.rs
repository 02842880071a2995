//! Next-step result from a graph node: follow the edge, jump to a node, or end.

/// Next step after running a node.
///
/// - **Continue**: follow the node's outgoing edge (END if it has none).
/// - **Node(id)**: run the given node next.
/// - **End**: stop; the current state is the final result.
///
/// **Interaction**: Returned by `Node::run`; consumed by `CompiledStateGraph`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Next {
    /// Follow the outgoing edge.
    Continue,
    /// Run the node with the given id next.
    Node(String),
    /// Stop and return the current state.
    End,
}

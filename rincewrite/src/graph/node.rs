//! Graph node trait: one step in a StateGraph.
//!
//! Receives state `S`, returns updated `S` and `Next` (continue, jump, or end).

use async_trait::async_trait;
use std::fmt::Debug;

use crate::error::ConversationError;

use super::{Next, RunContext};

/// One step in a graph: state in, (state out, next step).
///
/// The returned state replaces the previous one. A node that fails must not
/// have side effects on persisted state: the graph only checkpoints after a
/// node returns `Ok`.
///
/// **Interaction**: Registered with `StateGraph::add_node`; run by `CompiledStateGraph`.
#[async_trait]
pub trait Node<S>: Send + Sync
where
    S: Clone + Send + Sync + Debug + 'static,
{
    /// Node id (e.g. `"welcome"`, `"chat"`). Must be unique within a graph.
    fn id(&self) -> &str;

    /// One step: state in, (state out, next step).
    async fn run(&self, state: S) -> Result<(S, Next), ConversationError>;

    /// Variant with run context (streaming, config, cancellation).
    ///
    /// Default implementation calls `run` and ignores the context.
    async fn run_with_context(
        &self,
        state: S,
        _ctx: &RunContext<S>,
    ) -> Result<(S, Next), ConversationError> {
        self.run(state).await
    }
}

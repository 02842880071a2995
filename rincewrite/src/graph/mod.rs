//! # Graph engine
//!
//! A small state-graph runtime: nodes that map state to state, explicit edges
//! with `START`/`END` sentinels, interrupt points, and per-node checkpoints.
//!
//! ```text
//! StateGraph::new()
//!     .with_interrupt_before(["review"])
//!     .compile_with_checkpointer(saver)?   // validation: CompilationError
//!     .invoke(Some(input), Some(config))  // -> RunOutcome::Interrupted { node_id: "review", .. }
//! ```
//!
//! A paused thread is continued with `invoke(None, ..)` or patched and continued
//! in one step with `invoke_with_update`. `stream*` variants report progress as
//! [`StreamEvent`](crate::stream::StreamEvent)s.

mod compile_error;
mod compiled;
mod logging;
mod next;
mod node;
mod retry;
mod run_context;
mod state_graph;

pub use compile_error::CompilationError;
pub use compiled::{CompiledStateGraph, RunOutcome, StateSnapshot};
pub use next::Next;
pub use node::Node;
pub use retry::RetryPolicy;
pub use run_context::RunContext;
pub use state_graph::{StateGraph, END, START};

//! Logging helpers for graph execution.
//!
//! Structured `tracing` events for graph runs, node execution, interrupts and
//! checkpoint writes.

use std::fmt::Debug;

use crate::error::ConversationError;

use super::Next;

pub fn log_node_start(node_id: &str) {
    tracing::debug!(node_id = node_id, "Starting node execution");
}

/// Logs the input state of a node at trace level.
pub fn log_node_state<S: Debug>(node_id: &str, state: &S) {
    tracing::trace!(node_id = node_id, state = ?state, "Node execution: state");
}

pub fn log_node_complete(node_id: &str, next: &Next) {
    tracing::debug!(node_id = node_id, ?next, "Node execution complete");
}

pub fn log_node_retry(node_id: &str, attempt: usize, error: &ConversationError) {
    tracing::warn!(node_id = node_id, attempt, %error, "Retrying node");
}

pub fn log_interrupt(node_id: &str) {
    tracing::info!(node_id = node_id, "Graph interrupted before node");
}

pub fn log_checkpoint_saved(checkpoint_id: &str, step: i64, next: Option<&str>) {
    tracing::debug!(checkpoint_id, step, ?next, "Checkpoint saved");
}

pub fn log_graph_start(thread_id: Option<&str>) {
    tracing::info!(?thread_id, "Starting graph execution");
}

pub fn log_graph_complete() {
    tracing::info!("Graph execution complete");
}

pub fn log_graph_error(error: &ConversationError) {
    tracing::error!(?error, "Graph execution error");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_functions() {
        log_node_start("test_node");
        log_node_state("test_node", &());
        log_node_complete("test_node", &Next::End);
        log_node_retry("test_node", 0, &ConversationError::Cancelled);
        log_interrupt("test_node");
        log_checkpoint_saved("cp", 0, Some("next"));
        log_graph_start(Some("t"));
        log_graph_complete();
        log_graph_error(&ConversationError::ExecutionFailed("test".to_string()));
    }
}

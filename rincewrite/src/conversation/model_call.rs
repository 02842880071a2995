//! One bounded model call, streamed into the run's token channel when requested.

use std::time::Duration;

use crate::error::ConversationError;
use crate::graph::RunContext;
use crate::llm::LlmClient;
use crate::message::Message;
use crate::state::ConversationState;

/// Calls the model with `messages` and returns the reply text.
///
/// When `ctx` streams `Messages`, each non-empty content delta is forwarded as a
/// token tagged with `node_id` while the call is in flight. The whole call,
/// token forwarding included, is bounded by `timeout`; on expiry the call is
/// dropped and `ModelUnavailable` is returned.
pub(crate) async fn call_model(
    llm: &dyn LlmClient,
    messages: &[Message],
    ctx: Option<&RunContext<ConversationState>>,
    node_id: &str,
    timeout: Duration,
) -> Result<String, ConversationError> {
    let call = async {
        match ctx.and_then(|c| c.token_sender(node_id)) {
            Some(sender) => {
                let (delta_tx, delta_rx) = sender.channel();
                let (result, forwarded) = tokio::join!(
                    llm.invoke_stream(messages, Some(delta_tx)),
                    sender.forward_tokens(delta_rx),
                );
                tracing::trace!(node = node_id, forwarded, "model stream closed");
                result
            }
            None => llm.invoke(messages).await,
        }
    };

    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result.map(|response| response.content),
        Err(_) => Err(ConversationError::ModelUnavailable(format!(
            "timed out after {}ms",
            timeout.as_millis()
        ))),
    }
}

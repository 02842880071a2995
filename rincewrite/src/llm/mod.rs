//! LLM client abstraction for the welcome and chat nodes.
//!
//! A node renders its prompt into a list of [`Message`]s and asks an
//! [`LlmClient`] for the assistant reply. The model is an opaque capability:
//! the conversation graph never depends on a concrete vendor.
//!
//! # Streaming Support
//!
//! `invoke_stream()` accepts an optional `Sender<ModelDelta>` and emits raw model
//! deltas as they arrive (content text, tool-call fragments, usage). The
//! streaming adapter in [`crate::stream`] turns them into token chunks. The
//! default implementation calls `invoke()` and sends the full content as one delta.

mod mock;
mod openai;

pub use mock::MockLlm;
pub use openai::ChatOpenAI;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::ConversationError;
use crate::message::Message;

/// Token usage for one LLM call (prompt + completion).
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LlmUsage {
    /// Tokens in the prompt (input).
    pub prompt_tokens: u32,
    /// Tokens in the completion (output).
    pub completion_tokens: u32,
    /// Total tokens (prompt + completion).
    pub total_tokens: u32,
}

/// Response from an LLM completion.
///
/// **Interaction**: Returned by `LlmClient::invoke()`; the welcome and chat nodes
/// append `content` as one assistant message.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LlmResponse {
    /// Assistant message content (plain text).
    pub content: String,
    /// Token usage for this call, when the provider reports it.
    pub usage: Option<LlmUsage>,
}

/// One raw delta from a streaming model call.
///
/// Only `Content` carries user-visible text; the other variants are dropped by
/// the token adapter.
#[derive(Clone, Debug, PartialEq)]
pub enum ModelDelta {
    /// A piece of assistant text. May be empty.
    Content(String),
    /// Part of a tool call the model is assembling.
    ToolCallFragment {
        index: u32,
        name: Option<String>,
        arguments: String,
    },
    /// Usage accounting, usually sent once at the end of the stream.
    Usage(LlmUsage),
}

/// LLM client: given messages, returns the assistant reply.
///
/// Implementations: [`MockLlm`] (scripted, for tests and `--mock`) and
/// [`ChatOpenAI`] (OpenAI-compatible chat completions).
///
/// # Streaming
///
/// When `delta_tx` is `Some`, implementations send [`ModelDelta`]s through the
/// channel as they arrive and still return the complete [`LlmResponse`] at the
/// end. The concatenated `Content` deltas must equal `LlmResponse::content`.
///
/// **Interaction**: Used by the welcome and chat nodes of `ConversationGraph`.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Invoke one turn: read messages, return assistant content.
    async fn invoke(&self, messages: &[Message]) -> Result<LlmResponse, ConversationError>;

    /// Streaming variant: invoke with an optional delta sender.
    ///
    /// Default implementation calls `invoke()` and sends the full content as one delta.
    async fn invoke_stream(
        &self,
        messages: &[Message],
        delta_tx: Option<mpsc::Sender<ModelDelta>>,
    ) -> Result<LlmResponse, ConversationError> {
        let response = self.invoke(messages).await?;

        if let Some(tx) = delta_tx {
            if !response.content.is_empty() {
                let _ = tx.send(ModelDelta::Content(response.content.clone())).await;
            }
        }

        Ok(response)
    }
}

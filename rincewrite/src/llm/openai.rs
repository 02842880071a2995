//! OpenAI Chat Completions client implementing `LlmClient` (ChatOpenAI).
//!
//! Talks to any OpenAI-compatible chat completions endpoint. Requires
//! `OPENAI_API_KEY` (or explicit config); `OPENAI_BASE_URL` selects another host.
//!
//! # Streaming
//!
//! `invoke_stream()` uses `create_stream` and forwards every SSE chunk as
//! [`ModelDelta`]s: `choices[0].delta.content` becomes `Content`, each entry of
//! `choices[0].delta.tool_calls` becomes a `ToolCallFragment`, and a trailing
//! `usage` becomes `Usage`. The returned content is the concatenation of the
//! content deltas.
//!
//! **Interaction**: Implements `LlmClient`; used by the conversation nodes like `MockLlm`.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tracing::{debug, trace};

use crate::error::ConversationError;
use crate::llm::{LlmClient, LlmResponse, LlmUsage, ModelDelta};
use crate::message::Message;

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestUserMessage, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs,
    },
    Client,
};

/// OpenAI Chat Completions client implementing `LlmClient`.
///
/// Uses `OPENAI_API_KEY` from the environment by default; or provide
/// config via `ChatOpenAI::with_config`.
pub struct ChatOpenAI {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: Option<f32>,
}

impl ChatOpenAI {
    /// Build client from the environment: `OPENAI_API_KEY`, and `OPENAI_BASE_URL`
    /// when set.
    pub fn new(model: impl Into<String>) -> Self {
        let mut config = OpenAIConfig::new();
        if let Some(base) = Self::api_base_from_env() {
            config = config.with_api_base(base);
        }
        Self::with_config(config, model)
    }

    /// Build client with custom config (e.g. custom API key or base URL).
    pub fn with_config(config: OpenAIConfig, model: impl Into<String>) -> Self {
        Self {
            client: Client::with_config(config),
            model: model.into(),
            temperature: None,
        }
    }

    /// Set temperature (0–2). Lower values are more deterministic.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Model name sent with each request.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// `OPENAI_BASE_URL` normalized to end in `/v1`.
    fn api_base_from_env() -> Option<String> {
        let base = std::env::var("OPENAI_BASE_URL").ok()?;
        let base = base.trim().trim_end_matches('/');
        if base.is_empty() {
            return None;
        }
        Some(if base.ends_with("/v1") {
            base.to_string()
        } else {
            format!("{}/v1", base)
        })
    }

    /// Chat completions URL used for logging.
    fn chat_completions_url() -> String {
        let base = Self::api_base_from_env()
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());
        format!("{}/chat/completions", base)
    }

    /// Convert our `Message` list to OpenAI request messages.
    fn messages_to_request(messages: &[Message]) -> Vec<ChatCompletionRequestMessage> {
        messages
            .iter()
            .map(|m| match m {
                Message::System(s) => ChatCompletionRequestMessage::System(
                    ChatCompletionRequestSystemMessage::from(s.as_str()),
                ),
                Message::User(s) => ChatCompletionRequestMessage::User(
                    ChatCompletionRequestUserMessage::from(s.as_str()),
                ),
                Message::Assistant(s) => {
                    ChatCompletionRequestMessage::Assistant((s.as_str()).into())
                }
            })
            .collect()
    }

    fn build_request(
        &self,
        messages: &[Message],
        stream: bool,
    ) -> Result<CreateChatCompletionRequest, ConversationError> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(self.model.clone());
        args.messages(Self::messages_to_request(messages));
        if stream {
            args.stream(true);
        }
        if let Some(t) = self.temperature {
            args.temperature(t);
        }
        args.build().map_err(|e| {
            ConversationError::ExecutionFailed(format!("OpenAI request build failed: {}", e))
        })
    }
}

#[async_trait]
impl LlmClient for ChatOpenAI {
    async fn invoke(&self, messages: &[Message]) -> Result<LlmResponse, ConversationError> {
        let trace_id = uuid::Uuid::new_v4().to_string();
        let request = self.build_request(messages, false)?;

        let url = Self::chat_completions_url();
        debug!(
            trace_id = %trace_id,
            url = %url,
            model = %self.model,
            message_count = messages.len(),
            temperature = ?self.temperature,
            "OpenAI chat create"
        );
        if let Ok(js) = serde_json::to_string_pretty(&request) {
            trace!(trace_id = %trace_id, url = %url, request = %js, "OpenAI request body");
        }

        let response =
            self.client.chat().create(request).await.map_err(|e| {
                ConversationError::ModelUnavailable(format!("OpenAI API error: {}", e))
            })?;

        if let Ok(js) = serde_json::to_string_pretty(&response) {
            trace!(trace_id = %trace_id, url = %url, response = %js, "OpenAI response body");
        }

        let usage = response.usage.as_ref().map(|u| LlmUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });
        let choice = response.choices.into_iter().next().ok_or_else(|| {
            ConversationError::ModelUnavailable("OpenAI returned no choices".to_string())
        })?;

        Ok(LlmResponse {
            content: choice.message.content.unwrap_or_default(),
            usage,
        })
    }

    /// Streaming variant: sends deltas as they arrive from OpenAI.
    async fn invoke_stream(
        &self,
        messages: &[Message],
        delta_tx: Option<mpsc::Sender<ModelDelta>>,
    ) -> Result<LlmResponse, ConversationError> {
        let Some(delta_tx) = delta_tx else {
            return self.invoke(messages).await;
        };

        let trace_id = uuid::Uuid::new_v4().to_string();
        let request = self.build_request(messages, true)?;

        let url = Self::chat_completions_url();
        debug!(
            trace_id = %trace_id,
            url = %url,
            model = %self.model,
            message_count = messages.len(),
            stream = true,
            temperature = ?self.temperature,
            "OpenAI chat create_stream"
        );
        if let Ok(js) = serde_json::to_string_pretty(&request) {
            trace!(trace_id = %trace_id, url = %url, request = %js, "OpenAI stream request body");
        }

        let mut stream = self
            .client
            .chat()
            .create_stream(request)
            .await
            .map_err(|e| {
                ConversationError::ModelUnavailable(format!("OpenAI stream error: {}", e))
            })?;

        let mut full_content = String::new();
        let mut stream_usage: Option<LlmUsage> = None;

        while let Some(result) = stream.next().await {
            let response = result.map_err(|e| {
                ConversationError::ModelUnavailable(format!("OpenAI stream error: {}", e))
            })?;

            if let Some(ref u) = response.usage {
                stream_usage = Some(LlmUsage {
                    prompt_tokens: u.prompt_tokens,
                    completion_tokens: u.completion_tokens,
                    total_tokens: u.total_tokens,
                });
            }

            for choice in response.choices {
                let delta = &choice.delta;

                if let Some(ref content) = delta.content {
                    full_content.push_str(content);
                    let _ = delta_tx.send(ModelDelta::Content(content.clone())).await;
                }

                if let Some(ref tool_calls) = delta.tool_calls {
                    for tc in tool_calls {
                        let (name, arguments) = match tc.function {
                            Some(ref f) => (f.name.clone(), f.arguments.clone().unwrap_or_default()),
                            None => (None, String::new()),
                        };
                        let _ = delta_tx
                            .send(ModelDelta::ToolCallFragment {
                                index: tc.index,
                                name,
                                arguments,
                            })
                            .await;
                    }
                }
            }
        }

        if let Some(ref u) = stream_usage {
            let _ = delta_tx.send(ModelDelta::Usage(u.clone())).await;
        }

        trace!(
            trace_id = %trace_id,
            content_len = full_content.len(),
            "OpenAI stream complete"
        );

        Ok(LlmResponse {
            content: full_content,
            usage: stream_usage,
        })
    }
}

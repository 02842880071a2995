//! Mock LLM for tests and the `--mock` CLI mode.
//!
//! Returns scripted assistant replies in order, then repeats the last one.
//! Can inject failures and latency, and records every message list it receives.
//!
//! # Streaming Support
//!
//! `MockLlm` implements `invoke_stream()` with configurable streaming behavior:
//! - Default: sends content as a single delta
//! - Character-by-character: one `Content` delta per character (for stream testing)

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::ConversationError;
use crate::llm::{LlmClient, LlmResponse, LlmUsage, ModelDelta};
use crate::message::Message;

/// Mock LLM: scripted assistant replies.
///
/// **Interaction**: Implements `LlmClient`; used by the conversation graph in tests
/// and by the CLI when run with `--mock`.
pub struct MockLlm {
    /// Replies not yet handed out.
    replies: Mutex<VecDeque<String>>,
    /// Returned once `replies` is exhausted.
    fallback: String,
    /// When true, invoke_stream sends each character as a separate delta.
    stream_by_char: AtomicBool,
    /// Number of upcoming calls that fail with `ModelUnavailable`.
    failures: AtomicUsize,
    /// Latency added before each reply.
    delay: Option<Duration>,
    /// Tool-call fragment emitted ahead of the content when streaming.
    tool_fragment: Option<(String, String)>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl MockLlm {
    /// Creates a mock that always returns `content`.
    pub fn new(content: impl Into<String>) -> Self {
        Self::with_replies(vec![content.into()])
    }

    /// Creates a mock that returns `replies` in order, then repeats the last one.
    pub fn with_replies(replies: Vec<String>) -> Self {
        let fallback = replies.last().cloned().unwrap_or_default();
        Self {
            replies: Mutex::new(replies.into()),
            fallback,
            stream_by_char: AtomicBool::new(false),
            failures: AtomicUsize::new(0),
            delay: None,
            tool_fragment: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Enable character-by-character streaming for `invoke_stream()`.
    pub fn with_stream_by_char(self) -> Self {
        self.stream_by_char.store(true, Ordering::SeqCst);
        self
    }

    /// Sleep for `delay` before answering (timeout and cancellation tests).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Emit a tool-call fragment before the content when streaming.
    pub fn with_tool_call_fragment(
        mut self,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        self.tool_fragment = Some((name.into(), arguments.into()));
        self
    }

    /// Make the next `n` calls fail with `ModelUnavailable`.
    pub fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    /// Message lists received so far, one entry per call (failed calls included).
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of calls received so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    async fn next_reply(&self, messages: &[Message]) -> Result<String, ConversationError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(messages.to_vec());

        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }

        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ConversationError::ModelUnavailable(
                "mock model failure".into(),
            ));
        }

        let reply = self
            .replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        Ok(reply)
    }
}

fn usage_for(messages: &[Message], content: &str) -> LlmUsage {
    let prompt_tokens: u32 = messages
        .iter()
        .map(|m| m.content().split_whitespace().count() as u32)
        .sum();
    let completion_tokens = content.split_whitespace().count() as u32;
    LlmUsage {
        prompt_tokens,
        completion_tokens,
        total_tokens: prompt_tokens + completion_tokens,
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn invoke(&self, messages: &[Message]) -> Result<LlmResponse, ConversationError> {
        let content = self.next_reply(messages).await?;
        Ok(LlmResponse {
            usage: Some(usage_for(messages, &content)),
            content,
        })
    }

    async fn invoke_stream(
        &self,
        messages: &[Message],
        delta_tx: Option<mpsc::Sender<ModelDelta>>,
    ) -> Result<LlmResponse, ConversationError> {
        let response = self.invoke(messages).await?;
        let Some(tx) = delta_tx else {
            return Ok(response);
        };

        if let Some((name, arguments)) = &self.tool_fragment {
            let _ = tx
                .send(ModelDelta::ToolCallFragment {
                    index: 0,
                    name: Some(name.clone()),
                    arguments: arguments.clone(),
                })
                .await;
        }

        if self.stream_by_char.load(Ordering::SeqCst) {
            for c in response.content.chars() {
                let _ = tx.send(ModelDelta::Content(c.to_string())).await;
            }
        } else if !response.content.is_empty() {
            let _ = tx.send(ModelDelta::Content(response.content.clone())).await;
        }

        if let Some(usage) = &response.usage {
            let _ = tx.send(ModelDelta::Usage(usage.clone())).await;
        }

        Ok(response)
    }
}

//! Chat node: answer the latest user turn with the full history in view.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ConversationError;
use crate::graph::{Next, Node, RunContext};
use crate::llm::LlmClient;
use crate::message::Message;
use crate::prompts::PromptTemplate;
use crate::state::{ConversationState, CHAT};

use super::model_call::call_model;

pub struct ChatNode {
    llm: Arc<dyn LlmClient>,
    template: PromptTemplate,
    timeout: Duration,
}

impl ChatNode {
    pub fn new(llm: Arc<dyn LlmClient>, template: PromptTemplate, timeout: Duration) -> Self {
        Self {
            llm,
            template,
            timeout,
        }
    }

    async fn respond(
        &self,
        mut state: ConversationState,
        ctx: Option<&RunContext<ConversationState>>,
    ) -> Result<(ConversationState, Next), ConversationError> {
        let request = self.template.render_chat(&state)?;
        let reply = call_model(self.llm.as_ref(), &request, ctx, CHAT, self.timeout).await?;
        state.messages.push(Message::Assistant(reply));
        Ok((state, Next::Continue))
    }
}

#[async_trait]
impl Node<ConversationState> for ChatNode {
    fn id(&self) -> &str {
        CHAT
    }

    async fn run(
        &self,
        state: ConversationState,
    ) -> Result<(ConversationState, Next), ConversationError> {
        self.respond(state, None).await
    }

    async fn run_with_context(
        &self,
        state: ConversationState,
        ctx: &RunContext<ConversationState>,
    ) -> Result<(ConversationState, Next), ConversationError> {
        self.respond(state, Some(ctx)).await
    }
}

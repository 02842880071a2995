//! Welcome node: greet the writer from the intake fields.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ConversationError;
use crate::graph::{Next, Node, RunContext};
use crate::llm::LlmClient;
use crate::message::Message;
use crate::prompts::PromptTemplate;
use crate::state::{ConversationState, WELCOME};

use super::model_call::call_model;

/// Renders the `welcome` template from the four intake fields, calls the model,
/// and appends the reply as one assistant message.
pub struct WelcomeNode {
    llm: Arc<dyn LlmClient>,
    template: PromptTemplate,
    timeout: Duration,
}

impl WelcomeNode {
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
        let request = self.template.render_welcome(&state)?;
        let reply = call_model(self.llm.as_ref(), &request, ctx, WELCOME, self.timeout).await?;
        state.messages.push(Message::Assistant(reply));
        Ok((state, Next::Continue))
    }
}

#[async_trait]
impl Node<ConversationState> for WelcomeNode {
    fn id(&self) -> &str {
        WELCOME
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

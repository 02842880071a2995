//! User action node: the pause/resume point. Never calls the model.

use async_trait::async_trait;

use crate::error::ConversationError;
use crate::graph::{Next, Node};
use crate::state::{ConversationState, USER_ACTION};

/// Identity node. The graph interrupts before it; a resume patches the state
/// as if this node had produced it and continues at its successor.
pub struct UserActionNode;

#[async_trait]
impl Node<ConversationState> for UserActionNode {
    fn id(&self) -> &str {
        USER_ACTION
    }

    async fn run(
        &self,
        state: ConversationState,
    ) -> Result<(ConversationState, Next), ConversationError> {
        Ok((state, Next::Continue))
    }
}

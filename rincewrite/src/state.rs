//! Conversation state, node positions, and the payloads that create or patch it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConversationError;
use crate::message::Message;

/// Node id of the welcome step.
pub const WELCOME: &str = "welcome";
/// Node id of the pause/resume point.
pub const USER_ACTION: &str = "user_action";
/// Node id of the chat step.
pub const CHAT: &str = "chat";

/// State shared by every node of the conversation graph.
///
/// Owned by the graph during a run; the persisted snapshot is owned by the
/// checkpoint store between turns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    pub piece_name: String,
    pub piece_description: String,
    pub user_name: String,
    pub user_description: String,
    pub messages: Vec<Message>,
}

impl ConversationState {
    /// Last assistant message, if any.
    pub fn last_reply(&self) -> Option<&str> {
        self.messages.iter().rev().find_map(|m| match m {
            Message::Assistant(s) => Some(s.as_str()),
            _ => None,
        })
    }
}

/// Where a conversation thread is, or will continue from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodePosition {
    Welcome,
    UserAction,
    Chat,
}

impl NodePosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodePosition::Welcome => WELCOME,
            NodePosition::UserAction => USER_ACTION,
            NodePosition::Chat => CHAT,
        }
    }
}

impl fmt::Display for NodePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodePosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            WELCOME => Ok(NodePosition::Welcome),
            USER_ACTION => Ok(NodePosition::UserAction),
            CHAT => Ok(NodePosition::Chat),
            other => Err(format!("unknown node position: {}", other)),
        }
    }
}

/// Intake form payload: what the piece is and who is writing it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intake {
    pub piece_name: String,
    pub piece_description: String,
    pub user_name: String,
    pub user_description: String,
}

impl From<Intake> for ConversationState {
    fn from(intake: Intake) -> Self {
        ConversationState {
            piece_name: intake.piece_name,
            piece_description: intake.piece_description,
            user_name: intake.user_name,
            user_description: intake.user_description,
            messages: Vec::new(),
        }
    }
}

/// User text(s) appended at the interrupt point before the graph resumes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumePatch {
    pub messages: Vec<String>,
}

impl ResumePatch {
    /// Patch carrying one user message.
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            messages: vec![text.into()],
        }
    }

    /// Rejects an empty patch or one containing blank text.
    pub fn validate(&self) -> Result<(), ConversationError> {
        if self.messages.is_empty() {
            return Err(ConversationError::InvalidResumePatch(
                "no user message supplied".into(),
            ));
        }
        if let Some(i) = self.messages.iter().position(|m| m.trim().is_empty()) {
            return Err(ConversationError::InvalidResumePatch(format!(
                "user message {} is blank",
                i
            )));
        }
        Ok(())
    }

    /// Appends the patch to `state` as user messages.
    pub fn apply(&self, mut state: ConversationState) -> ConversationState {
        state
            .messages
            .extend(self.messages.iter().cloned().map(Message::User));
        state
    }
}

//! Display model of the writing session: what a view shows, nothing durable.

use serde::Serialize;

use crate::message::{Message, Role};
use crate::state::{ConversationState, Intake};

/// Label of the submit control next to the draft area.
pub const SERVICE_BUTTON: &str = "answer";

/// Quick replies offered next to the chat.
pub const ACTION_BUTTONS: [&str; 3] = [
    "i have no idea what i'm doing",
    "help me structure the thing",
    "i have a draft already",
];

/// Hint shown in the piece description field of the intake dialog.
pub const PIECE_DESC_PLACEHOLDER: &str = "Your piece description here. Any description that \
can help bootstrap the structuration of your piece is most welcome (title, chapters...). \
Anything about its contents is also welcome (subject, themes, characters, plot, ...). \
But don't waste too much time here: we will build this and the rest along the way, together.";

/// Hint shown in the user description field of the intake dialog.
pub const USER_DESC_PLACEHOLDER: &str = "Your own description here. Any description that can \
help me bootstrap my behaviour towards you is most welcome (why do you write?, what do you \
like to write? ...). Anything about your character is also welcome (what are you trying to \
achieve by writing?, how do you like to be addressed? ...). But don't waste too much time \
here: we will build this and the rest along the way, together.";

/// One line of the chat log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayMessage {
    pub role: Role,
    pub text: String,
}

impl DisplayMessage {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }
}

/// Everything a view needs to draw the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppState {
    /// Intake dialog open.
    pub show_dialog: bool,
    /// First intake form (the piece) done; the dialog shows the user form.
    pub piece_form_submitted: bool,
    pub piece_name: String,
    pub piece_description: String,
    pub user_name: String,
    pub user_description: String,
    pub messages: Vec<DisplayMessage>,
    /// The welcome turn completed; later turns resume the thread.
    pub conversation_started: bool,
    /// Markdown shown in the read-only render pane.
    pub renderer_content: String,
    /// False until the conversation has started and while a turn is streaming.
    pub input_enabled: bool,
    pub service_button: String,
    pub action_buttons: Vec<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            show_dialog: true,
            piece_form_submitted: false,
            piece_name: String::new(),
            piece_description: String::new(),
            user_name: String::new(),
            user_description: String::new(),
            messages: Vec::new(),
            conversation_started: false,
            renderer_content: String::new(),
            input_enabled: false,
            service_button: SERVICE_BUTTON.to_string(),
            action_buttons: ACTION_BUTTONS.iter().map(|b| b.to_string()).collect(),
        }
    }
}

impl AppState {
    /// A turn is streaming: the dialog is closed but input is disabled.
    pub fn turn_in_flight(&self) -> bool {
        !self.show_dialog && !self.input_enabled
    }

    /// Display state of a conversation loaded from the store, ready for the next turn.
    pub fn from_conversation(conversation: &ConversationState) -> Self {
        Self {
            show_dialog: false,
            piece_form_submitted: true,
            piece_name: conversation.piece_name.clone(),
            piece_description: conversation.piece_description.clone(),
            user_name: conversation.user_name.clone(),
            user_description: conversation.user_description.clone(),
            messages: conversation
                .messages
                .iter()
                .map(|m: &Message| DisplayMessage::new(m.role(), m.content()))
                .collect(),
            conversation_started: true,
            renderer_content: super::update::render_header(
                &conversation.piece_name,
                &conversation.piece_description,
            ),
            input_enabled: true,
            ..Self::default()
        }
    }

    /// Intake payload built from the two forms.
    pub fn intake(&self) -> Intake {
        Intake {
            piece_name: self.piece_name.clone(),
            piece_description: self.piece_description.clone(),
            user_name: self.user_name.clone(),
            user_description: self.user_description.clone(),
        }
    }
}

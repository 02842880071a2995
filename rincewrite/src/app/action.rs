//! Inputs to and outputs of the pure update function.

use crate::error::ConversationError;
use crate::state::{Intake, ResumePatch};

/// Something the user did, or something the conversation reported back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// First intake form: the piece.
    PieceSubmitted { name: String, description: String },
    /// Second intake form: the writer. Starts the conversation.
    UserSubmitted { name: String, description: String },
    /// Free text from the draft area.
    MessageSubmitted(String),
    /// One of the quick-reply buttons, by index.
    ActionButtonPressed(usize),
    /// A chunk of the reply being streamed.
    TokenReceived(String),
    /// The running turn paused at the next user action.
    TurnFinished,
    /// The running turn failed.
    TurnFailed(ConversationError),
}

/// Work the session driver performs after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    StartConversation(Intake),
    ResumeConversation(ResumePatch),
    /// Push the new state to the view.
    Render,
}

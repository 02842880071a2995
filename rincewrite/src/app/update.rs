//! Pure state transitions: `update(state, action) -> (state, effects)`.

use crate::message::Role;
use crate::state::ResumePatch;

use super::action::{Action, Effect};
use super::state::{AppState, DisplayMessage};

/// New state plus the effects to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: AppState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn unchanged(state: &AppState) -> Self {
        Self {
            state: state.clone(),
            effects: Vec::new(),
        }
    }

    fn render(state: AppState) -> Self {
        Self {
            state,
            effects: vec![Effect::Render],
        }
    }
}

/// Markdown header of the render pane.
pub fn render_header(piece_name: &str, piece_description: &str) -> String {
    format!("# {}\n\n{}\n\n", piece_name, piece_description)
}

/// Applies one action. Never performs I/O; actions that do not apply in the
/// current state return it unchanged with no effects.
pub fn update(state: &AppState, action: Action) -> Transition {
    match action {
        Action::PieceSubmitted { name, description } => {
            if !state.show_dialog || state.piece_form_submitted {
                return Transition::unchanged(state);
            }
            let mut next = state.clone();
            next.piece_name = name;
            next.piece_description = description;
            next.piece_form_submitted = true;
            Transition::render(next)
        }
        Action::UserSubmitted { name, description } => {
            if !state.show_dialog || !state.piece_form_submitted {
                return Transition::unchanged(state);
            }
            let mut next = state.clone();
            next.user_name = name;
            next.user_description = description;
            next.show_dialog = false;
            next.renderer_content = render_header(&next.piece_name, &next.piece_description);
            next.messages
                .push(DisplayMessage::new(Role::Assistant, String::new()));
            next.input_enabled = false;
            let intake = next.intake();
            Transition {
                state: next,
                effects: vec![Effect::Render, Effect::StartConversation(intake)],
            }
        }
        Action::MessageSubmitted(text) => submit(state, text),
        Action::ActionButtonPressed(index) => match state.action_buttons.get(index) {
            Some(label) => submit(state, label.clone()),
            None => Transition::unchanged(state),
        },
        Action::TokenReceived(text) => {
            let mut next = state.clone();
            match next.messages.last_mut() {
                Some(last) if last.role == Role::Assistant => last.text.push_str(&text),
                _ => next.messages.push(DisplayMessage::new(Role::Assistant, text)),
            }
            Transition::render(next)
        }
        Action::TurnFinished => {
            let mut next = state.clone();
            next.conversation_started = true;
            next.input_enabled = true;
            Transition::render(next)
        }
        Action::TurnFailed(error) => {
            let mut next = state.clone();
            if matches!(next.messages.last(), Some(m) if m.role == Role::Assistant) {
                next.messages.pop();
            }
            // The store never received the message of a failed turn.
            if let Some(unsent) = next.messages.last_mut().filter(|m| m.role == Role::User) {
                *unsent = DisplayMessage::new(Role::System, format!("not sent: {}", unsent.text));
            }
            next.messages
                .push(DisplayMessage::new(Role::System, format!("error: {}", error)));
            if next.conversation_started {
                next.input_enabled = true;
            } else {
                // Nothing was persisted: the writer form is offered again.
                next.show_dialog = true;
            }
            Transition::render(next)
        }
    }
}

fn submit(state: &AppState, text: String) -> Transition {
    if !state.input_enabled || text.trim().is_empty() {
        return Transition::unchanged(state);
    }
    let mut next = state.clone();
    next.messages
        .push(DisplayMessage::new(Role::User, text.clone()));
    next.messages
        .push(DisplayMessage::new(Role::Assistant, String::new()));
    next.input_enabled = false;
    Transition {
        state: next,
        effects: vec![
            Effect::Render,
            Effect::ResumeConversation(ResumePatch::message(text)),
        ],
    }
}

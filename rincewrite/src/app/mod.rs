//! Application state for a writing session, kept apart from any rendering.
//!
//! - [`AppState`]: plain display model (dialog flag, chat log, render pane, controls).
//! - [`update`]: pure `(state, action) -> Transition { state, effects }`.
//! - [`Session`]: executes effects against a [`ConversationGraph`](crate::ConversationGraph)
//!   and pushes every rendered state to a [`View`].

mod action;
mod session;
mod state;
mod update;

pub use action::{Action, Effect};
pub use session::{Session, TurnCanceller, View};
pub use state::{
    AppState, DisplayMessage, ACTION_BUTTONS, PIECE_DESC_PLACEHOLDER, SERVICE_BUTTON,
    USER_DESC_PLACEHOLDER,
};
pub use update::{render_header, update, Transition};

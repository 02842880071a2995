//! Terminal front end for Rincewrite.
//!
//! [`TerminalView`] renders a [`Session`](rincewrite::Session) as a streamed chat
//! log; [`run_session`] asks the two intake forms and then runs one turn per line.

pub mod repl;
pub mod terminal;

pub use repl::{run_session, Command};
pub use terminal::TerminalView;

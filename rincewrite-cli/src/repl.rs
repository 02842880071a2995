//! Interactive loop: intake forms, then one turn per input line until EOF or `/quit`.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncBufRead, Lines};

use rincewrite::app::{PIECE_DESC_PLACEHOLDER, USER_DESC_PLACEHOLDER};
use rincewrite::{Action, Session};

use crate::terminal::TerminalView;

/// One line typed at the chat prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Quit,
    /// Print the render pane.
    Render,
    Help,
    /// Press action button `n` (0-based).
    Button(usize),
    Message(String),
}

impl Command {
    /// `None` for a blank line.
    pub fn parse(line: &str) -> Option<Command> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }
        if is_quit_command(trimmed) {
            return Some(Command::Quit);
        }
        let command = match trimmed {
            "/render" => Command::Render,
            "/help" => Command::Help,
            _ => match trimmed.strip_prefix('/').and_then(|n| n.parse::<usize>().ok()) {
                Some(n) if n > 0 => Command::Button(n - 1),
                _ => Command::Message(line.to_string()),
            },
        };
        Some(command)
    }
}

fn is_quit_command(s: &str) -> bool {
    let lower = s.trim().to_lowercase();
    matches!(lower.as_str(), "quit" | "exit" | "/quit")
}

fn print_help<W: Write + Send>(session: &mut Session<TerminalView<W>>) {
    let buttons: Vec<String> = session
        .state()
        .action_buttons
        .iter()
        .enumerate()
        .map(|(i, label)| format!("  /{}  {}", i + 1, label))
        .collect();
    let view = session.view_mut();
    view.line("Type a message and press enter to send it.");
    for b in buttons {
        view.line(&b);
    }
    view.line("  /render  show the render pane");
    view.line("  /quit    leave (the thread stays in the store)");
}

/// Reads one line; `None` on EOF.
async fn ask<R, W>(
    session: &mut Session<TerminalView<W>>,
    input: &mut Lines<R>,
    prompt: &str,
) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
    W: Write + Send,
{
    session.view_mut().prompt(prompt);
    input.next_line().await
}

/// Runs the intake dialog until it closes. Returns `false` on EOF.
async fn run_intake<R, W>(
    session: &mut Session<TerminalView<W>>,
    input: &mut Lines<R>,
    in_turn: &AtomicBool,
) -> std::io::Result<bool>
where
    R: AsyncBufRead + Unpin,
    W: Write + Send,
{
    while session.state().show_dialog {
        let action = if !session.state().piece_form_submitted {
            session.view_mut().line("About your piece");
            let Some(name) = ask(session, input, "name: ").await? else {
                return Ok(false);
            };
            session.view_mut().line(PIECE_DESC_PLACEHOLDER);
            let Some(description) = ask(session, input, "description: ").await? else {
                return Ok(false);
            };
            Action::PieceSubmitted { name, description }
        } else {
            session.view_mut().line("About you");
            let Some(name) = ask(session, input, "name: ").await? else {
                return Ok(false);
            };
            session.view_mut().line(USER_DESC_PLACEHOLDER);
            let Some(description) = ask(session, input, "description: ").await? else {
                return Ok(false);
            };
            Action::UserSubmitted { name, description }
        };
        in_turn.store(true, Ordering::SeqCst);
        session.dispatch(action).await;
        in_turn.store(false, Ordering::SeqCst);
    }
    Ok(true)
}

/// Drives `session` from `input` until EOF or a quit command.
///
/// `in_turn` is raised while a turn streams so a Ctrl-C handler can tell
/// cancelling a reply from leaving.
pub async fn run_session<R, W>(
    session: &mut Session<TerminalView<W>>,
    mut input: Lines<R>,
    in_turn: Arc<AtomicBool>,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write + Send,
{
    if !run_intake(session, &mut input, &in_turn).await? {
        return Ok(());
    }
    session.view_mut().line("(/help for commands)");

    loop {
        let Some(line) = ask(session, &mut input, "> ").await? else {
            break;
        };
        let action = match Command::parse(&line) {
            None => continue,
            Some(Command::Quit) => break,
            Some(Command::Help) => {
                print_help(session);
                continue;
            }
            Some(Command::Render) => {
                let pane = session.state().renderer_content.clone();
                session.view_mut().line(pane.trim_end());
                continue;
            }
            Some(Command::Button(i)) => Action::ActionButtonPressed(i),
            Some(Command::Message(text)) => Action::MessageSubmitted(text),
        };
        in_turn.store(true, Ordering::SeqCst);
        session.dispatch(action).await;
        in_turn.store(false, Ordering::SeqCst);
        if session.state().show_dialog && !run_intake(session, &mut input, &in_turn).await? {
            break;
        }
    }

    session.view_mut().line("Bye.");
    Ok(())
}

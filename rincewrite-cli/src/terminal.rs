//! Line-oriented view: streams the chat log to a writer as the session state changes.

use std::io::Write;

use rincewrite::{AppState, DisplayMessage, Role, View};

const ASSISTANT_LABEL: &str = "rincewrite: ";
const USER_LABEL: &str = "you: ";
const SYSTEM_LABEL: &str = "[!] ";

/// Prints new chat entries as they appear and streams the reply in flight.
///
/// User entries are not echoed by [`render`](View::render): the terminal already
/// shows what was typed at the prompt. [`print_transcript`](Self::print_transcript)
/// prints them for a reopened thread.
pub struct TerminalView<W: Write + Send> {
    out: W,
    /// Entries fully printed.
    committed: usize,
    /// Text already printed of the entry at `committed` while it streams.
    partial: Option<String>,
}

impl TerminalView<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> TerminalView<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            committed: 0,
            partial: None,
        }
    }

    pub fn writer(&self) -> &W {
        &self.out
    }

    pub fn into_writer(self) -> W {
        self.out
    }

    /// Writes `text` and a newline.
    pub fn line(&mut self, text: &str) {
        let _ = writeln!(self.out, "{}", text);
        let _ = self.out.flush();
    }

    /// Writes `text` without a newline, for an input prompt.
    pub fn prompt(&mut self, text: &str) {
        let _ = write!(self.out, "{}", text);
        let _ = self.out.flush();
    }

    /// Prints every entry of `state`, user lines included, and marks them printed.
    pub fn print_transcript(&mut self, state: &AppState) {
        for m in &state.messages {
            self.print_entry(m);
        }
        self.committed = state.messages.len();
        self.partial = None;
    }

    fn print_entry(&mut self, m: &DisplayMessage) {
        let label = match m.role {
            Role::Assistant => ASSISTANT_LABEL,
            Role::User => USER_LABEL,
            Role::System => SYSTEM_LABEL,
        };
        let _ = writeln!(self.out, "{}{}", label, m.text);
    }

    fn stream_entry(&mut self, m: &DisplayMessage) {
        if self.partial.is_none() {
            let _ = write!(self.out, "{}", ASSISTANT_LABEL);
        }
        let printed = self.partial.get_or_insert_with(String::new);
        if let Some(rest) = m.text.strip_prefix(printed.as_str()) {
            let _ = write!(self.out, "{}", rest);
            *printed = m.text.clone();
        }
    }

    fn finish_entry(&mut self, m: &DisplayMessage) {
        match self.partial.take() {
            Some(printed) => match m.text.strip_prefix(printed.as_str()) {
                Some(rest) if m.role == Role::Assistant => {
                    let _ = writeln!(self.out, "{}", rest);
                }
                _ => {
                    // The streamed entry was replaced (failed turn).
                    let _ = writeln!(self.out);
                    self.print_entry(m);
                }
            },
            None if m.role == Role::User => {}
            None => self.print_entry(m),
        }
    }
}

impl<W: Write + Send> View for TerminalView<W> {
    fn render(&mut self, state: &AppState) {
        if state.messages.len() < self.committed {
            self.committed = state.messages.len();
        }
        let in_flight = state.turn_in_flight();
        let last = state.messages.len().saturating_sub(1);
        for i in self.committed..state.messages.len() {
            let m = &state.messages[i];
            if in_flight && i == last && m.role == Role::Assistant {
                self.stream_entry(m);
                break;
            }
            self.finish_entry(m);
            self.committed = i + 1;
        }
        let _ = self.out.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn printed(view: &TerminalView<Vec<u8>>) -> String {
        String::from_utf8_lossy(view.writer()).into_owned()
    }

    fn state(messages: Vec<DisplayMessage>, in_flight: bool) -> AppState {
        AppState {
            show_dialog: false,
            piece_form_submitted: true,
            input_enabled: !in_flight,
            messages,
            ..AppState::default()
        }
    }

    #[test]
    fn streams_reply_then_ends_the_line() {
        let mut view = TerminalView::new(Vec::new());
        view.render(&state(vec![DisplayMessage::new(Role::Assistant, "")], true));
        view.render(&state(vec![DisplayMessage::new(Role::Assistant, "Wel")], true));
        view.render(&state(vec![DisplayMessage::new(Role::Assistant, "Welcome")], true));
        view.render(&state(vec![DisplayMessage::new(Role::Assistant, "Welcome")], false));
        assert_eq!(printed(&view), "rincewrite: Welcome\n");
    }

    #[test]
    fn label_is_printed_once_per_reply() {
        let mut view = TerminalView::new(Vec::new());
        view.render(&state(vec![DisplayMessage::new(Role::Assistant, "")], true));
        view.render(&state(vec![DisplayMessage::new(Role::Assistant, "")], true));
        view.render(&state(vec![DisplayMessage::new(Role::Assistant, "W")], true));
        view.render(&state(vec![DisplayMessage::new(Role::Assistant, "W")], false));
        let mut turn = vec![
            DisplayMessage::new(Role::Assistant, "W"),
            DisplayMessage::new(Role::User, "next"),
            DisplayMessage::new(Role::Assistant, ""),
        ];
        view.render(&state(turn.clone(), true));
        turn[2] = DisplayMessage::new(Role::Assistant, "Ok");
        view.render(&state(turn.clone(), true));
        view.render(&state(turn, false));
        assert_eq!(printed(&view), "rincewrite: W\nrincewrite: Ok\n");
    }

    #[test]
    fn user_lines_are_not_echoed() {
        let mut view = TerminalView::new(Vec::new());
        let done = vec![DisplayMessage::new(Role::Assistant, "Hi")];
        view.render(&state(done.clone(), false));
        let mut turn = done;
        turn.push(DisplayMessage::new(Role::User, "outline please"));
        turn.push(DisplayMessage::new(Role::Assistant, "Sure"));
        view.render(&state(turn, false));
        assert_eq!(printed(&view), "rincewrite: Hi\nrincewrite: Sure\n");
    }

    /// **Scenario**: a turn fails mid-stream; the partial line is closed and the error shown.
    #[test]
    fn failed_stream_is_replaced_by_the_error() {
        let mut view = TerminalView::new(Vec::new());
        view.render(&state(vec![DisplayMessage::new(Role::Assistant, "Chap")], true));
        view.render(&state(
            vec![DisplayMessage::new(Role::System, "error: model unavailable")],
            false,
        ));
        assert_eq!(
            printed(&view),
            "rincewrite: Chap\n[!] error: model unavailable\n"
        );
    }

    #[test]
    fn transcript_includes_user_lines() {
        let mut view = TerminalView::new(Vec::new());
        let s = state(
            vec![
                DisplayMessage::new(Role::Assistant, "Welcome"),
                DisplayMessage::new(Role::User, "hello"),
            ],
            false,
        );
        view.print_transcript(&s);
        view.render(&s);
        assert_eq!(printed(&view), "rincewrite: Welcome\nyou: hello\n");
    }
}

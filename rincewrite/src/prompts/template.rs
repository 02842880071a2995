//! Prompt templates and placeholder expansion.
//!
//! A template is a system text plus an optional human text. `{name}` is replaced
//! by one of the intake fields; `{{` and `}}` produce literal braces.

use serde::Deserialize;

use crate::error::ConversationError;
use crate::message::Message;
use crate::state::ConversationState;

/// Placeholders a template may use.
pub const PLACEHOLDERS: [&str; 4] = ["piece_name", "piece_desc", "user_name", "user_desc"];

/// One named prompt, as stored in `<name>.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PromptTemplate {
    pub system: String,
    #[serde(default)]
    pub human: Option<String>,
}

fn lookup<'a>(state: &'a ConversationState, name: &str) -> Option<&'a str> {
    match name {
        "piece_name" => Some(&state.piece_name),
        "piece_desc" => Some(&state.piece_description),
        "user_name" => Some(&state.user_name),
        "user_desc" => Some(&state.user_description),
        _ => None,
    }
}

/// Expands `{name}` placeholders in `text`. Err carries a description of the
/// first unknown or unterminated placeholder.
fn expand<'a, F>(text: &str, resolve: F) -> Result<String, String>
where
    F: Fn(&str) -> Option<&'a str>,
{
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for n in chars.by_ref() {
                    if n == '}' {
                        closed = true;
                        break;
                    }
                    name.push(n);
                }
                if !closed {
                    return Err(format!("unterminated placeholder '{{{}'", name));
                }
                match resolve(name.trim()) {
                    Some(value) => out.push_str(value),
                    None => return Err(format!("unknown placeholder '{{{}}}'", name)),
                }
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

impl PromptTemplate {
    /// Checks that the system text is not blank and every placeholder is known.
    pub fn validate(&self, name: &str) -> Result<(), ConversationError> {
        if self.system.trim().is_empty() {
            return Err(ConversationError::TemplateResolutionFailure(format!(
                "template '{}' has an empty system prompt",
                name
            )));
        }
        let known = |p: &str| PLACEHOLDERS.contains(&p).then_some("");
        for text in std::iter::once(&self.system).chain(self.human.iter()) {
            expand(text, known).map_err(|e| {
                ConversationError::TemplateResolutionFailure(format!("template '{}': {}", name, e))
            })?;
        }
        Ok(())
    }

    fn render_text(&self, text: &str, state: &ConversationState) -> Result<String, ConversationError> {
        expand(text, |p| lookup(state, p))
            .map_err(ConversationError::TemplateResolutionFailure)
    }

    /// Messages for the first turn: the system text, then the human text if any.
    pub fn render_welcome(
        &self,
        state: &ConversationState,
    ) -> Result<Vec<Message>, ConversationError> {
        let mut messages = vec![Message::System(self.render_text(&self.system, state)?)];
        if let Some(human) = &self.human {
            messages.push(Message::User(self.render_text(human, state)?));
        }
        Ok(messages)
    }

    /// Messages for a chat turn: the system text followed by the full history.
    /// A human text, if present, is appended after the history.
    pub fn render_chat(
        &self,
        state: &ConversationState,
    ) -> Result<Vec<Message>, ConversationError> {
        let mut messages = Vec::with_capacity(state.messages.len() + 2);
        messages.push(Message::System(self.render_text(&self.system, state)?));
        messages.extend(state.messages.iter().cloned());
        if let Some(human) = &self.human {
            messages.push(Message::User(self.render_text(human, state)?));
        }
        Ok(messages)
    }
}

//! Prompt templates: YAML-defined, embedded by default, overridable per directory.
//!
//! | Template  | Used by        | Rendered as                          |
//! |-----------|----------------|--------------------------------------|
//! | `welcome` | welcome node   | system (+ optional human) message    |
//! | `chat`    | chat node      | system message followed by history   |

mod load;
mod template;

pub use load::{PromptLoadError, PromptRegistry, CHAT_PROMPT, WELCOME_PROMPT};
pub use template::{PromptTemplate, PLACEHOLDERS};

//! Rincewrite conversation flow built on the generic graph engine.
//!
//! ```text
//! START → welcome → [interrupt] user_action → chat ─┐
//!                         ▲                          │
//!                         └──────────────────────────┘
//! ```
//!
//! `welcome` and `chat` each append one assistant message; `user_action` is the
//! identity node the graph pauses before. See [`ConversationGraph`].

mod chat_node;
mod graph;
mod model_call;
mod user_action_node;
mod welcome_node;

pub use chat_node::ChatNode;
pub use graph::{
    ConversationEvent, ConversationGraph, ConversationGraphBuilder, ConversationSnapshot,
    ConversationStream, DEFAULT_MODEL_TIMEOUT,
};
pub use user_action_node::UserActionNode;
pub use welcome_node::WelcomeNode;

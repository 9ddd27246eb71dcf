//! Chat turns on top of [`crate::completions::CompletionClient`].
//!
//! A turn stores the user's message, asks for a completion and stores the
//! reply. Completion failures never lose the user's turn: the error text is
//! stored as the reply instead.

pub mod service;
pub mod store;
pub mod types;

pub use service::ChatService;
pub use store::{ChatStore, InMemoryChatStore};
pub use types::{
    Chat, ChatError, ChatMessage, DEFAULT_CHAT_TITLE, MessageRole, title_from_message,
};

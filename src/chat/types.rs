use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Title given to chats created without one.
pub const DEFAULT_CHAT_TITLE: &str = "New Chat";

const TITLE_WORDS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Ai,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: u64,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: u64,
    pub user_id: u64,
    pub title: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

#[derive(Error, Debug)]
pub enum ChatError {
    /// Missing, or owned by another user.
    #[error("Chat {chat_id} not found")]
    NotFound { chat_id: u64 },

    #[error("Chat store error: {0}")]
    Store(String),
}

/// First few words of a message, used to title a chat on its first turn.
pub fn title_from_message(content: &str) -> String {
    content
        .split_whitespace()
        .take(TITLE_WORDS)
        .collect::<Vec<_>>()
        .join(" ")
}

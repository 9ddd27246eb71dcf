use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::types::{Chat, ChatError, ChatMessage, MessageRole};

/// Persistence for chats and their messages.
#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn insert_chat(&self, user_id: u64, title: String) -> Result<Chat, ChatError>;

    /// The chat with its messages, if it exists and belongs to `user_id`.
    async fn find_chat(&self, user_id: u64, chat_id: u64) -> Result<Option<Chat>, ChatError>;

    /// `user_id`'s chats, newest first, optionally filtered by a
    /// case-insensitive title substring.
    async fn list_chats(&self, user_id: u64, search: Option<&str>)
    -> Result<Vec<Chat>, ChatError>;

    async fn append_message(
        &self,
        chat_id: u64,
        role: MessageRole,
        content: String,
    ) -> Result<ChatMessage, ChatError>;

    async fn set_title(&self, chat_id: u64, title: String) -> Result<(), ChatError>;
}

/// Process-local [`ChatStore`].
#[derive(Default)]
pub struct InMemoryChatStore {
    chats: RwLock<BTreeMap<u64, Chat>>,
    next_chat_id: AtomicU64,
    next_message_id: AtomicU64,
}

impl InMemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatStore for InMemoryChatStore {
    async fn insert_chat(&self, user_id: u64, title: String) -> Result<Chat, ChatError> {
        let chat = Chat {
            id: self.next_chat_id.fetch_add(1, Ordering::Relaxed) + 1,
            user_id,
            title,
            created_at: Utc::now(),
            messages: Vec::new(),
        };
        self.chats.write().await.insert(chat.id, chat.clone());
        Ok(chat)
    }

    async fn find_chat(&self, user_id: u64, chat_id: u64) -> Result<Option<Chat>, ChatError> {
        let chats = self.chats.read().await;
        Ok(chats
            .get(&chat_id)
            .filter(|chat| chat.user_id == user_id)
            .cloned())
    }

    async fn list_chats(
        &self,
        user_id: u64,
        search: Option<&str>,
    ) -> Result<Vec<Chat>, ChatError> {
        let needle = search
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let chats = self.chats.read().await;
        let mut matching: Vec<Chat> = chats
            .values()
            .filter(|chat| chat.user_id == user_id)
            .filter(|chat| {
                needle
                    .as_deref()
                    .is_none_or(|n| chat.title.to_lowercase().contains(n))
            })
            .cloned()
            .collect();

        matching.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(matching)
    }

    async fn append_message(
        &self,
        chat_id: u64,
        role: MessageRole,
        content: String,
    ) -> Result<ChatMessage, ChatError> {
        let mut chats = self.chats.write().await;
        let chat = chats
            .get_mut(&chat_id)
            .ok_or(ChatError::NotFound { chat_id })?;

        let message = ChatMessage {
            id: self.next_message_id.fetch_add(1, Ordering::Relaxed) + 1,
            role,
            content,
            created_at: Utc::now(),
        };
        chat.messages.push(message.clone());
        Ok(message)
    }

    async fn set_title(&self, chat_id: u64, title: String) -> Result<(), ChatError> {
        let mut chats = self.chats.write().await;
        let chat = chats
            .get_mut(&chat_id)
            .ok_or(ChatError::NotFound { chat_id })?;
        chat.title = title;
        Ok(())
    }
}

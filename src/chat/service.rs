use std::sync::Arc;

use tracing::{info, warn};

use crate::completions::CompletionClient;
use crate::core::CompletionBackend;

use super::store::ChatStore;
use super::types::{Chat, ChatError, DEFAULT_CHAT_TITLE, MessageRole, title_from_message};

pub struct ChatService<S, B> {
    store: S,
    completions: Arc<CompletionClient<B>>,
}

impl<S, B> ChatService<S, B>
where
    S: ChatStore,
    B: CompletionBackend,
{
    pub fn new(store: S, completions: Arc<CompletionClient<B>>) -> Self {
        Self { store, completions }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn create_chat(&self, user_id: u64, title: Option<String>) -> Result<Chat, ChatError> {
        let title = title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CHAT_TITLE.to_string());
        self.store.insert_chat(user_id, title).await
    }

    pub async fn list_chats(
        &self,
        user_id: u64,
        search: Option<&str>,
    ) -> Result<Vec<Chat>, ChatError> {
        self.store.list_chats(user_id, search).await
    }

    pub async fn get_chat(&self, user_id: u64, chat_id: u64) -> Result<Chat, ChatError> {
        self.store
            .find_chat(user_id, chat_id)
            .await?
            .ok_or(ChatError::NotFound { chat_id })
    }

    /// Run one chat turn and return the chat with both new messages.
    ///
    /// The user's message is stored before the completion is requested. If the
    /// completion fails, the error text is stored as the reply and the turn
    /// still succeeds.
    #[tracing::instrument(name = "chat_turn", skip(self, content), err)]
    pub async fn add_message(
        &self,
        user_id: u64,
        chat_id: u64,
        content: &str,
    ) -> Result<Chat, ChatError> {
        let chat = self.get_chat(user_id, chat_id).await?;

        self.store
            .append_message(chat.id, MessageRole::User, content.to_string())
            .await?;

        if chat.messages.is_empty() {
            let title = title_from_message(content);
            if !title.is_empty() {
                self.store.set_title(chat.id, title).await?;
            }
        }

        let reply = match self.completions.complete(content, None).await {
            Ok(text) => text,
            Err(error) => {
                warn!(chat_id, error = %error, "Completion failed, storing error as reply");
                format!("Error generating response: {error}")
            }
        };

        self.store
            .append_message(chat.id, MessageRole::Ai, reply)
            .await?;
        info!(chat_id, "Chat turn stored");

        self.get_chat(user_id, chat_id).await
    }
}

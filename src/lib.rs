//! # chatai
//!
//! Gemini completions that survive rate limits and retired model names.
//!
//! [`CompletionClient`] tries an ordered list of candidate models. Rate-limited
//! calls are retried on the same model with exponential backoff. Unknown or
//! unsupported models, and any other upstream error, fall through to the next
//! candidate. An empty completion is answered with a fixed apology instead
//! of an error.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chatai::{CompletionClient, CompletionConfig, GeminiClient, GeminiConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let gemini = GeminiClient::new(GeminiConfig::from_env())?;
//!     let client = CompletionClient::new(
//!         gemini,
//!         CompletionConfig::default().with_models(["gemini-2.0-flash", "gemini-pro"]),
//!     )?;
//!
//!     let reply = client.complete("Explain how AI works", None).await?;
//!     println!("{reply}");
//!     Ok(())
//! }
//! ```
//!
//! [`ChatService`] builds chat turns on top of the client and stores the error
//! text as the reply when a completion fails.

pub mod chat;
pub mod completions;
pub mod core;
pub mod provider;

pub use crate::chat::{
    Chat, ChatError, ChatMessage, ChatService, ChatStore, InMemoryChatStore, MessageRole,
};
pub use crate::completions::{CompletionClient, CompletionConfig};
pub use crate::core::{
    CompletionBackend, CompletionError, DEFAULT_SYSTEM_MESSAGE, EMPTY_RESPONSE_FALLBACK,
    ErrorClass, HttpClientConfig, UpstreamError,
};
pub use crate::provider::{GeminiClient, GeminiConfig, Provider};
pub use tokio_util::sync::CancellationToken;

//! Retrying, model-falling-back completions over any [`crate::core::CompletionBackend`].

pub mod client;

pub use client::{CompletionClient, CompletionConfig};

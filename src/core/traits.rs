use std::sync::Arc;

use async_trait::async_trait;

use super::error::UpstreamError;

/// A single-shot text generation service addressed by model name.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Whether a credential is configured. Checked before any call is made.
    fn has_credential(&self) -> bool {
        true
    }

    /// Generate text for `prompt` with `model`. An empty string is a valid
    /// (if unhelpful) success.
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, UpstreamError>;
}

#[async_trait]
impl<T> CompletionBackend for Arc<T>
where
    T: CompletionBackend + ?Sized,
{
    fn has_credential(&self) -> bool {
        (**self).has_credential()
    }

    async fn generate(&self, model: &str, prompt: &str) -> Result<String, UpstreamError> {
        (**self).generate(model, prompt).await
    }
}

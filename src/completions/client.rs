//! Completion client with rate-limit backoff and model fallback.
//!
//! Candidate models are tried in order. Each model gets up to `max_retries`
//! attempts, but only rate-limited attempts are retried; any other failure
//! moves straight on to the next model.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::{
    CompletionBackend, CompletionError, DEFAULT_SYSTEM_MESSAGE, EMPTY_RESPONSE_FALLBACK, Prompt,
};
use crate::provider::constants::gemini;

/// Retry and fallback settings for [`CompletionClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionConfig {
    /// Model names to try, most preferred first (default: `["gemini-pro"]`)
    pub models: Vec<String>,
    /// Attempts per model before falling back (default: 3)
    pub max_retries: u32,
    /// Base duration for exponential backoff (default: 2 seconds)
    pub base_delay: Duration,
    /// System instruction used when the caller passes none
    pub system_message: String,
    /// Upper bound on a whole call, backoff included (default: none)
    pub deadline: Option<Duration>,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            models: vec![gemini::DEFAULT_MODEL.to_string()],
            max_retries: 3,
            base_delay: Duration::from_secs(2),
            system_message: DEFAULT_SYSTEM_MESSAGE.to_string(),
            deadline: None,
        }
    }
}

impl CompletionConfig {
    pub fn with_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.models = models.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_system_message(mut self, system_message: impl Into<String>) -> Self {
        self.system_message = system_message.into();
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Delay before retrying the same model after the zero-based `attempt`
    /// was rate limited: `base_delay * 2^attempt`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    fn validate(&self) -> Result<(), CompletionError> {
        if self.models.is_empty() {
            return Err(CompletionError::Configuration(
                "At least one candidate model is required".to_string(),
            ));
        }
        if self.max_retries == 0 {
            return Err(CompletionError::Configuration(
                "max_retries must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Produces one completion per call, masking transient upstream failures.
///
/// Holds no mutable state, so a single client can serve concurrent callers
/// through a shared reference.
pub struct CompletionClient<B> {
    backend: B,
    config: CompletionConfig,
}

impl<B: CompletionBackend> CompletionClient<B> {
    pub fn new(backend: B, config: CompletionConfig) -> Result<Self, CompletionError> {
        config.validate()?;
        Ok(Self { backend, config })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &CompletionConfig {
        &self.config
    }

    /// Generate a reply to `user_message`.
    ///
    /// `system_message` falls back to the configured default.
    pub async fn complete(
        &self,
        user_message: &str,
        system_message: Option<&str>,
    ) -> Result<String, CompletionError> {
        self.complete_with_cancellation(user_message, system_message, &CancellationToken::new())
            .await
    }

    /// Like [`complete`](Self::complete), but gives up with
    /// [`CompletionError::Cancelled`] as soon as `cancel` fires, whether the
    /// client is waiting on the backend or sleeping between retries.
    #[tracing::instrument(
        name = "complete",
        skip(self, user_message, system_message, cancel),
        fields(models = ?self.config.models, max_retries = self.config.max_retries),
        err
    )]
    pub async fn complete_with_cancellation(
        &self,
        user_message: &str,
        system_message: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<String, CompletionError> {
        if !self.backend.has_credential() {
            return Err(CompletionError::MissingCredential);
        }

        let prompt = Prompt::new(user_message)
            .with_system(system_message.unwrap_or(self.config.system_message.as_str()))
            .render();

        match self.config.deadline {
            Some(timeout) => {
                match tokio::time::timeout(timeout, self.run_candidates(&prompt, cancel)).await {
                    Ok(result) => result,
                    Err(_) => Err(CompletionError::DeadlineExceeded { timeout }),
                }
            }
            None => self.run_candidates(&prompt, cancel).await,
        }
    }

    async fn run_candidates(
        &self,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<String, CompletionError> {
        let max_retries = self.config.max_retries;
        let mut attempts = 0u32;
        let mut last_error = None;

        for model in &self.config.models {
            for attempt in 0..max_retries {
                attempts += 1;

                let outcome = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(CompletionError::Cancelled),
                    outcome = self.backend.generate(model, prompt) => outcome,
                };

                let error = match outcome {
                    Ok(text) if text.is_empty() => {
                        debug!(model = %model, attempt, "Model returned empty text");
                        return Ok(EMPTY_RESPONSE_FALLBACK.to_string());
                    }
                    Ok(text) => {
                        debug!(model = %model, attempt, "Completion succeeded");
                        return Ok(text);
                    }
                    Err(source) => CompletionError::from_upstream(model, source),
                };

                let retry_same_model = match &error {
                    CompletionError::RateLimited { .. } if attempt + 1 < max_retries => {
                        let delay = self.config.backoff_delay(attempt);
                        warn!(
                            model = %model,
                            attempt,
                            delay_secs = delay.as_secs_f64(),
                            "Rate limited, retrying after backoff"
                        );
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => return Err(CompletionError::Cancelled),
                            _ = tokio::time::sleep(delay) => {}
                        }
                        true
                    }
                    CompletionError::RateLimited { .. } => {
                        warn!(model = %model, max_retries, "Max retries exceeded, switching model");
                        false
                    }
                    CompletionError::ModelUnavailable { source, .. } => {
                        info!(model = %model, error = %source, "Model not found or unsupported, switching model");
                        false
                    }
                    other => {
                        warn!(model = %model, error = %other, "Upstream error, switching model");
                        false
                    }
                };

                last_error = Some(Box::new(error));
                if !retry_same_model {
                    break;
                }
            }
        }

        Err(CompletionError::AllModelsExhausted {
            models: self.config.models.clone(),
            attempts,
            last_error,
        })
    }
}

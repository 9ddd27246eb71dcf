use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// How the fallback policy reacts to a failed upstream call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The model name is unknown or unsupported for this credential.
    ModelUnavailable,
    /// The service is throttling this credential.
    RateLimited,
    /// Anything else.
    Upstream,
}

/// A failed call to the completion service, as reported by a backend.
///
/// Backends fill in whatever structured signal the service gives them
/// (`status_code`, `status`); `message` carries the human-readable text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamError {
    pub status_code: Option<u16>,
    pub status: Option<String>,
    pub message: String,
}

const UNAVAILABLE_PHRASES: &[&str] = &["not found", "not supported"];
const RATE_LIMIT_PHRASES: &[&str] = &["resource has been exhausted", "resource exhausted"];

impl UpstreamError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status_code: None,
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status_code(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Classify the failure, preferring structured codes over message text.
    pub fn classify(&self) -> ErrorClass {
        match self.status_code {
            Some(404) => return ErrorClass::ModelUnavailable,
            Some(429) => return ErrorClass::RateLimited,
            _ => {}
        }

        match self.status.as_deref() {
            Some("NOT_FOUND") => return ErrorClass::ModelUnavailable,
            Some("RESOURCE_EXHAUSTED") => return ErrorClass::RateLimited,
            _ => {}
        }

        let text = self.message.to_lowercase();
        if UNAVAILABLE_PHRASES.iter().any(|p| text.contains(p)) {
            ErrorClass::ModelUnavailable
        } else if RATE_LIMIT_PHRASES.iter().any(|p| text.contains(p)) {
            ErrorClass::RateLimited
        } else {
            ErrorClass::Upstream
        }
    }
}

impl fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.status_code, self.status.as_deref()) {
            (Some(code), Some(status)) => write!(f, "{code} {status}: {}", self.message),
            (Some(code), None) => write!(f, "{code}: {}", self.message),
            (None, Some(status)) => write!(f, "{status}: {}", self.message),
            (None, None) => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for UpstreamError {}

#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("API key missing. Configure a credential before requesting completions")]
    MissingCredential,

    #[error("Model {model} not found or not supported: {source}")]
    ModelUnavailable {
        model: String,
        #[source]
        source: UpstreamError,
    },

    #[error("Rate limit exceeded on {model}: {source}")]
    RateLimited {
        model: String,
        #[source]
        source: UpstreamError,
    },

    #[error("Error with {model}: {source}")]
    Upstream {
        model: String,
        #[source]
        source: UpstreamError,
    },

    #[error("No compatible models found or all failed (tried {models:?}, {attempts} attempts)")]
    AllModelsExhausted {
        models: Vec<String>,
        attempts: u32,
        #[source]
        last_error: Option<Box<CompletionError>>,
    },

    #[error("Completion cancelled")]
    Cancelled,

    #[error("Completion did not finish within {timeout:?}")]
    DeadlineExceeded { timeout: Duration },

    #[error("Failed to list models: {0}")]
    ListModels(#[source] UpstreamError),

    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl CompletionError {
    /// Wrap a backend failure for `model` according to its [`ErrorClass`].
    pub fn from_upstream(model: &str, source: UpstreamError) -> Self {
        let model = model.to_string();
        match source.classify() {
            ErrorClass::ModelUnavailable => CompletionError::ModelUnavailable { model, source },
            ErrorClass::RateLimited => CompletionError::RateLimited { model, source },
            ErrorClass::Upstream => CompletionError::Upstream { model, source },
        }
    }
}

#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use chatai::{CompletionBackend, UpstreamError};
use tokio::time::Instant;

type Script = dyn Fn(&str, usize) -> Result<String, UpstreamError> + Send + Sync;

/// A backend whose answers come from a closure of `(model, nth call to that
/// model)`, recording every call it receives.
pub struct ScriptedBackend {
    credential: bool,
    script: Box<Script>,
    calls: Mutex<Vec<RecordedCall>>,
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub model: String,
    pub prompt: String,
    pub at: Instant,
}

impl ScriptedBackend {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&str, usize) -> Result<String, UpstreamError> + Send + Sync + 'static,
    {
        Self {
            credential: true,
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(text: &'static str) -> Self {
        Self::new(move |_, _| Ok(text.to_string()))
    }

    pub fn without_credential() -> Self {
        Self {
            credential: false,
            ..Self::replying("unreachable")
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn models_called(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.model).collect()
    }

    /// Time between consecutive calls.
    pub fn gaps(&self) -> Vec<std::time::Duration> {
        self.calls()
            .windows(2)
            .map(|pair| pair[1].at.duration_since(pair[0].at))
            .collect()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    fn has_credential(&self) -> bool {
        self.credential
    }

    async fn generate(&self, model: &str, prompt: &str) -> Result<String, UpstreamError> {
        let nth = {
            let mut calls = self.calls.lock().unwrap();
            let nth = calls.iter().filter(|c| c.model == model).count();
            calls.push(RecordedCall {
                model: model.to_string(),
                prompt: prompt.to_string(),
                at: Instant::now(),
            });
            nth
        };
        (self.script)(model, nth)
    }
}

pub fn rate_limited() -> UpstreamError {
    UpstreamError::new("Resource has been exhausted (e.g. check quota).")
        .with_status_code(429)
        .with_status("RESOURCE_EXHAUSTED")
}

pub fn not_found(model: &str) -> UpstreamError {
    UpstreamError::new(format!(
        "models/{model} is not found for API version v1beta, or is not supported for generateContent."
    ))
    .with_status_code(404)
    .with_status("NOT_FOUND")
}

pub fn internal_error() -> UpstreamError {
    UpstreamError::new("An internal error has occurred.")
        .with_status_code(500)
        .with_status("INTERNAL")
}

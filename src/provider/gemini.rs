//! Google Gemini provider implementation.
//!
//! Talks to the `generateContent` REST endpoint directly. Only the fields the
//! completion path reads are modelled; everything else in the response is
//! ignored by serde.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::{
    CompletionBackend, CompletionError, HttpClient, HttpClientConfig, UpstreamError,
};
use crate::provider::Provider;
use crate::provider::constants::gemini;

/// Gemini-specific configuration. The credential is optional so a missing key
/// can be reported per call instead of aborting startup.
#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub http_config: HttpClientConfig,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Self::without_credential()
        }
    }

    /// A configuration with no API key. Every completion will fail with
    /// [`CompletionError::MissingCredential`].
    pub fn without_credential() -> Self {
        Self {
            api_key: None,
            base_url: Provider::Gemini.default_base_url().to_string(),
            http_config: HttpClientConfig::default(),
        }
    }

    /// Read the API key from `GOOGLE_API_KEY`, warning if it is not set.
    pub fn from_env() -> Self {
        let env_var = Provider::Gemini.default_api_key_env_var();
        let api_key = std::env::var(env_var)
            .ok()
            .filter(|key| !key.trim().is_empty());

        if api_key.is_none() {
            warn!(env_var, "API key not found; completions will fail until one is configured");
        }

        Self {
            api_key,
            ..Self::without_credential()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_http_config(mut self, config: HttpClientConfig) -> Self {
        self.http_config = config;
        self
    }
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("http_config", &self.http_config)
            .finish()
    }
}

pub struct GeminiClient {
    config: GeminiConfig,
    http: HttpClient,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, CompletionError> {
        let http = HttpClient::new(&config.http_config, None)?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn auth_headers(&self) -> Option<Vec<(String, String)>> {
        self.config
            .api_key
            .as_ref()
            .map(|key| vec![(gemini::API_KEY_HEADER.to_string(), key.clone())])
    }

    /// List the models this credential can call `generateContent` on, without
    /// the `models/` prefix.
    #[tracing::instrument(name = "list_models", skip(self), err)]
    pub async fn list_models(&self) -> Result<Vec<String>, CompletionError> {
        let headers = self
            .auth_headers()
            .ok_or(CompletionError::MissingCredential)?;
        let url = format!("{}/models", self.config.base_url);

        let mut names = Vec::new();
        let mut page_token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            pages += 1;
            let mut query = vec![("pageSize", gemini::LIST_MODELS_PAGE_SIZE)];
            if let Some(token) = page_token.as_deref() {
                query.push(("pageToken", token));
            }

            let page: ListModelsResponse = self
                .http
                .get_json(&url, &headers, &query)
                .await
                .map_err(|e| CompletionError::ListModels(decode_error_envelope(e)))?;

            names.extend(
                page.models
                    .into_iter()
                    .filter(|m| {
                        m.supported_generation_methods
                            .iter()
                            .any(|method| method == gemini::GENERATE_CONTENT_METHOD)
                    })
                    .map(|m| strip_model_prefix(&m.name).to_string()),
            );

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) if page_token.as_deref() == Some(token.as_str()) => {
                    warn!(
                        page_token = %token,
                        "Model listing returned the same page token twice, stopping"
                    );
                    break;
                }
                Some(_) if pages >= gemini::LIST_MODELS_MAX_PAGES => {
                    warn!(pages, "Model listing exceeded the page limit, stopping");
                    break;
                }
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(count = names.len(), "Listed generateContent models");
        Ok(names)
    }
}

#[async_trait]
impl CompletionBackend for GeminiClient {
    fn has_credential(&self) -> bool {
        self.config.api_key.is_some()
    }

    #[tracing::instrument(name = "gemini_generate", level = "debug", skip(self, prompt), err)]
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, UpstreamError> {
        let headers = self
            .auth_headers()
            .ok_or_else(|| UpstreamError::new("API key missing"))?;
        let url = format!(
            "{}/{}{}:{}",
            self.config.base_url,
            gemini::MODEL_NAME_PREFIX,
            strip_model_prefix(model),
            gemini::GENERATE_CONTENT_METHOD
        );

        let request = GenerateContentRequest::user_text(prompt);
        let response: GenerateContentResponse = self
            .http
            .post_json(&url, &headers, &request)
            .await
            .map_err(decode_error_envelope)?;

        response.text().inspect_err(|e| {
            debug!(model, error = %e, "Response carried no text");
        })
    }
}

fn strip_model_prefix(model: &str) -> &str {
    model.strip_prefix(gemini::MODEL_NAME_PREFIX).unwrap_or(model)
}

/// Lift `code`, `status` and `message` out of Google's JSON error envelope.
/// Bodies that are not an envelope are left as they are.
fn decode_error_envelope(err: UpstreamError) -> UpstreamError {
    let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(&err.message) else {
        return err;
    };

    UpstreamError {
        status_code: err.status_code.or(envelope.error.code),
        status: envelope.error.status.or(err.status),
        message: envelope.error.message.unwrap_or(err.message),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Role {
    User,
    Model,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
pub(crate) struct GenerateContentRequest {
    pub contents: Vec<Content>,
}

impl GenerateContentRequest {
    fn user_text(prompt: &str) -> Self {
        Self {
            contents: vec![Content {
                role: Some(Role::User),
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
}

impl GenerateContentResponse {
    /// Text of the first candidate, all text parts joined.
    ///
    /// A blocked prompt, a missing candidate or a candidate without any text
    /// part is an error, so the caller can move on to another model. Only a
    /// text part that is present but empty yields `Ok("")`.
    fn text(&self) -> Result<String, UpstreamError> {
        let Some(candidate) = self.candidates.first() else {
            let block_reason = self
                .prompt_feedback
                .as_ref()
                .and_then(|f| f.block_reason.as_deref())
                .unwrap_or("none");
            return Err(UpstreamError::new(format!(
                "Response has no candidates (blockReason={block_reason})"
            )));
        };

        let texts: Vec<&str> = candidate
            .content
            .iter()
            .flat_map(|content| &content.parts)
            .filter_map(|p| p.text.as_deref())
            .collect();

        if texts.is_empty() {
            let finish_reason = candidate.finish_reason.as_deref().unwrap_or("none");
            return Err(UpstreamError::new(format!(
                "Candidate has no text parts (finishReason={finish_reason})"
            )));
        }

        Ok(texts.concat())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<ModelEntry>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelEntry {
    name: String,
    #[serde(default)]
    supported_generation_methods: Vec<String>,
}

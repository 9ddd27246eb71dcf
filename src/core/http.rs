//! Shared HTTP transport for completion backends.
//!
//! Each call is a single attempt. Retrying and model fallback happen one level
//! up, in [`crate::completions::CompletionClient`], where the failure can be
//! classified against the whole candidate list.

use std::time::Duration;

use reqwest::RequestBuilder;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use super::error::{CompletionError, UpstreamError};

/// Configuration for the underlying HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Total time allowed for a single request
    pub timeout: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
        }
    }
}

pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    /// Create a new HTTP client with the given configuration.
    pub fn new(config: &HttpClientConfig, user_agent: Option<&str>) -> Result<Self, CompletionError> {
        let default_ua = format!("chatai/{}", env!("CARGO_PKG_VERSION"));
        let ua = user_agent.unwrap_or(default_ua.as_str());

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(ua)
            .build()
            .map_err(|e| {
                CompletionError::Configuration(format!("Failed to build reqwest client: {e}"))
            })?;

        Ok(Self { client })
    }

    /// POST a JSON body and decode the JSON response.
    #[tracing::instrument(
        name = "http_post_json",
        level = "debug",
        skip(self, headers, body),
        fields(url = %url),
        err
    )]
    pub async fn post_json<Req, Res>(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &Req,
    ) -> Result<Res, UpstreamError>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let request = with_headers(self.client.post(url).json(body), headers);
        send(request).await
    }

    /// GET with query parameters and decode the JSON response.
    #[tracing::instrument(
        name = "http_get_json",
        level = "debug",
        skip(self, headers, query),
        fields(url = %url),
        err
    )]
    pub async fn get_json<Res>(
        &self,
        url: &str,
        headers: &[(String, String)],
        query: &[(&str, &str)],
    ) -> Result<Res, UpstreamError>
    where
        Res: DeserializeOwned,
    {
        let request = with_headers(self.client.get(url).query(query), headers);
        send(request).await
    }
}

fn with_headers(mut request: RequestBuilder, headers: &[(String, String)]) -> RequestBuilder {
    for (name, value) in headers {
        request = request.header(name, value);
    }
    request
}

async fn send<Res: DeserializeOwned>(request: RequestBuilder) -> Result<Res, UpstreamError> {
    let res = request.send().await.map_err(|e| {
        warn!(error = %e, "HTTP request failed");
        UpstreamError::new(format!("Request failed: {e}"))
    })?;

    let status = res.status();
    let body = res
        .text()
        .await
        .map_err(|e| UpstreamError::new(format!("Failed to read response body: {e}")))?;

    if !status.is_success() {
        warn!(status = %status, "API returned error status");
        // The raw body is kept as the message so providers can decode their
        // own error envelope from it.
        return Err(UpstreamError::new(body).with_status_code(status.as_u16()));
    }

    debug!(status = %status, "HTTP request successful");

    serde_json::from_str(&body)
        .map_err(|e| UpstreamError::new(format!("Failed to parse API response: {e}")))
}

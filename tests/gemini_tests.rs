use std::time::Duration;

use chatai::{
    CompletionBackend, CompletionClient, CompletionConfig, CompletionError,
    EMPTY_RESPONSE_FALLBACK, ErrorClass, GeminiClient, GeminiConfig,
};
use serde_json::{Value, json};
use wiremock::{
    Match, Mock, MockServer, Request as WiremockRequest, ResponseTemplate,
    matchers::{header, method, path, query_param},
};

#[derive(Clone)]
struct WithoutQueryParam(&'static str);

impl Match for WithoutQueryParam {
    fn matches(&self, request: &WiremockRequest) -> bool {
        !request.url.query_pairs().any(|(key, _)| key == self.0)
    }
}

#[tokio::test]
async fn generate_posts_prompt_with_api_key_header() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-pro:generateContent"))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(text_response(&["Paris."]))
        .expect(1)
        .mount(&server)
        .await;

    let client = completion_client(&server, CompletionConfig::default());
    let reply = client
        .complete("What is the capital of France?", None)
        .await
        .expect("completion");
    assert_eq!(reply, "Paris.");

    let requests = server
        .received_requests()
        .await
        .expect("mock server should record requests");
    let body = parse_body(&requests[0]);
    assert_eq!(body["contents"][0]["role"], "user");
    assert_eq!(
        body["contents"][0]["parts"][0]["text"],
        "You are a helpful assistant.\n\nUser: What is the capital of France?"
    );
    assert!(requests[0].url.query().is_none(), "key must not be in the URL");
}

#[tokio::test]
async fn generate_joins_text_parts() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-pro:generateContent"))
        .respond_with(text_response(&["Hello, ", "world", "!"]))
        .mount(&server)
        .await;

    let gemini = gemini_client(&server);
    let text = gemini
        .generate("models/gemini-pro", "hi")
        .await
        .expect("generate");
    assert_eq!(text, "Hello, world!");
}

#[tokio::test]
async fn safety_blocked_candidate_falls_back_to_next_model() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/model-a:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "finishReason": "SAFETY" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/model-b:generateContent"))
        .respond_with(text_response(&["from b"]))
        .expect(1)
        .mount(&server)
        .await;

    let client = completion_client(
        &server,
        CompletionConfig::default().with_models(["model-a", "model-b"]),
    );
    let reply = client.complete("something borderline", None).await.unwrap();
    assert_eq!(reply, "from b");
}

#[tokio::test]
async fn blocked_prompt_on_every_model_is_exhausted() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-pro:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "promptFeedback": { "blockReason": "SAFETY" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = completion_client(&server, CompletionConfig::default());
    let err = client.complete("something blocked", None).await.unwrap_err();
    match err {
        CompletionError::AllModelsExhausted { last_error, .. } => match last_error.as_deref() {
            Some(CompletionError::Upstream { source, .. }) => {
                assert!(source.message.contains("blockReason=SAFETY"));
            }
            other => panic!("expected Upstream, got {other:?}"),
        },
        other => panic!("expected AllModelsExhausted, got {other:?}"),
    }
}

#[tokio::test]
async fn empty_text_part_becomes_fallback_text() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-pro:generateContent"))
        .respond_with(text_response(&[""]))
        .expect(1)
        .mount(&server)
        .await;

    let client = completion_client(&server, CompletionConfig::default());
    let reply = client.complete("say nothing", None).await.unwrap();
    assert_eq!(reply, EMPTY_RESPONSE_FALLBACK);
}

#[tokio::test]
async fn error_envelope_is_decoded_and_classified() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.0-pro:generateContent"))
        .respond_with(google_error(
            404,
            "NOT_FOUND",
            "models/gemini-1.0-pro is not found for API version v1beta",
        ))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-pro:generateContent"))
        .respond_with(google_error(429, "RESOURCE_EXHAUSTED", "Quota exceeded"))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-flaky:generateContent"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream connect error"))
        .mount(&server)
        .await;

    let gemini = gemini_client(&server);

    let missing = gemini.generate("gemini-1.0-pro", "hi").await.unwrap_err();
    assert_eq!(missing.status_code, Some(404));
    assert_eq!(missing.status.as_deref(), Some("NOT_FOUND"));
    assert_eq!(
        missing.message,
        "models/gemini-1.0-pro is not found for API version v1beta"
    );
    assert_eq!(missing.classify(), ErrorClass::ModelUnavailable);

    let limited = gemini.generate("gemini-pro", "hi").await.unwrap_err();
    assert_eq!(limited.classify(), ErrorClass::RateLimited);

    let flaky = gemini.generate("gemini-flaky", "hi").await.unwrap_err();
    assert_eq!(flaky.status_code, Some(503));
    assert_eq!(flaky.message, "upstream connect error");
    assert_eq!(flaky.classify(), ErrorClass::Upstream);
}

#[tokio::test]
async fn unknown_model_falls_back_to_next_candidate() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
        .respond_with(google_error(404, "NOT_FOUND", "model not found"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-pro:generateContent"))
        .respond_with(text_response(&["fallback answer"]))
        .expect(1)
        .mount(&server)
        .await;

    let client = completion_client(
        &server,
        CompletionConfig::default().with_models(["gemini-1.5-flash", "gemini-pro"]),
    );
    let reply = client.complete("hello", None).await.expect("completion");
    assert_eq!(reply, "fallback answer");
}

#[tokio::test]
async fn rate_limited_model_is_retried_then_exhausted() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-pro:generateContent"))
        .respond_with(google_error(
            429,
            "RESOURCE_EXHAUSTED",
            "Resource has been exhausted (e.g. check quota).",
        ))
        .expect(3)
        .mount(&server)
        .await;

    let client = completion_client(
        &server,
        CompletionConfig::default().with_base_delay(Duration::from_millis(10)),
    );
    let err = client.complete("hello", None).await.expect_err("exhausted");

    match err {
        CompletionError::AllModelsExhausted {
            attempts,
            last_error,
            ..
        } => {
            assert_eq!(attempts, 3);
            assert!(matches!(
                last_error.as_deref(),
                Some(CompletionError::RateLimited { .. })
            ));
        }
        other => panic!("expected AllModelsExhausted, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_key_makes_no_requests() {
    let server = MockServer::start().await;

    let config = GeminiConfig::without_credential().with_base_url(format!("{}/v1beta", server.uri()));
    let gemini = GeminiClient::new(config).unwrap();
    let client = CompletionClient::new(gemini, CompletionConfig::default()).unwrap();

    let err = client.complete("hello", None).await.expect_err("no key");
    assert!(matches!(err, CompletionError::MissingCredential));

    let listed = client.backend().list_models().await.expect_err("no key");
    assert!(matches!(listed, CompletionError::MissingCredential));

    let requests = server
        .received_requests()
        .await
        .expect("mock server should record requests");
    assert!(requests.is_empty());
}

#[tokio::test]
async fn list_models_filters_and_follows_pages() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1beta/models"))
        .and(header("x-goog-api-key", "test-key"))
        .and(WithoutQueryParam("pageToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [
                { "name": "models/gemini-pro", "supportedGenerationMethods": ["generateContent", "countTokens"] },
                { "name": "models/embedding-001", "supportedGenerationMethods": ["embedContent"] }
            ],
            "nextPageToken": "page-2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1beta/models"))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [
                { "name": "models/gemini-2.0-flash", "supportedGenerationMethods": ["generateContent"] },
                { "name": "models/aqa" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let models = gemini_client(&server).list_models().await.expect("models");
    assert_eq!(models, vec!["gemini-pro", "gemini-2.0-flash"]);
}

#[tokio::test]
async fn list_models_stops_on_repeated_page_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1beta/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [
                { "name": "models/gemini-pro", "supportedGenerationMethods": ["generateContent"] }
            ],
            "nextPageToken": "stuck"
        })))
        .expect(2)
        .mount(&server)
        .await;

    let models = tokio::time::timeout(
        Duration::from_secs(5),
        gemini_client(&server).list_models(),
    )
    .await
    .expect("listing should terminate")
    .expect("models");
    assert_eq!(models, vec!["gemini-pro", "gemini-pro"]);
}

#[tokio::test]
async fn list_models_reports_upstream_failure() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1beta/models"))
        .respond_with(google_error(403, "PERMISSION_DENIED", "API key not valid"))
        .mount(&server)
        .await;

    let err = gemini_client(&server).list_models().await.expect_err("denied");
    match err {
        CompletionError::ListModels(source) => {
            assert_eq!(source.status_code, Some(403));
            assert_eq!(source.status.as_deref(), Some("PERMISSION_DENIED"));
        }
        other => panic!("expected ListModels, got {other:?}"),
    }
}

fn gemini_client(server: &MockServer) -> GeminiClient {
    let config = GeminiConfig::new("test-key").with_base_url(format!("{}/v1beta", server.uri()));
    GeminiClient::new(config).expect("gemini client")
}

fn completion_client(
    server: &MockServer,
    config: CompletionConfig,
) -> CompletionClient<GeminiClient> {
    CompletionClient::new(gemini_client(server), config).expect("completion client")
}

fn text_response(parts: &[&str]) -> ResponseTemplate {
    let parts: Vec<Value> = parts.iter().map(|t| json!({ "text": t })).collect();
    ResponseTemplate::new(200).set_body_json(json!({
        "candidates": [{
            "content": { "role": "model", "parts": parts },
            "finishReason": "STOP"
        }]
    }))
}

fn google_error(code: u16, status: &str, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(code).set_body_json(json!({
        "error": { "code": code, "message": message, "status": status }
    }))
}

fn parse_body(request: &WiremockRequest) -> Value {
    serde_json::from_slice(&request.body).expect("request body should be valid json")
}

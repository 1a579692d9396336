//! Chat provider clients against local stand-ins for the OpenAI and Gemini HTTP APIs.

use axum::{
    extract::{Path, Query},
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use lib::config::ProviderSettings;
use lib::llm::{ChatProvider, GeminiClient, LlmError, OpenAiClient};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind free port");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{}", addr)
}

fn settings(base_url: &str) -> ProviderSettings {
    ProviderSettings {
        api_key: Some("secret".to_string()),
        model: Some("test-model".to_string()),
        base_url: Some(base_url.to_string()),
    }
}

/// Echoes the prompt along with what the client sent for auth, model and temperature.
async fn openai_completions(headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let content = format!(
        "{}|{}|{}|{}",
        auth,
        body["model"].as_str().unwrap_or_default(),
        body["temperature"],
        body["messages"][0]["content"].as_str().unwrap_or_default()
    );
    Json(json!({ "choices": [{ "message": { "role": "assistant", "content": content } }] }))
}

async fn gemini_generate(
    Path(action): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Json<Value> {
    let text = format!(
        "{}|{}|{}",
        action,
        params.get("key").cloned().unwrap_or_default(),
        body["contents"][0]["parts"][0]["text"].as_str().unwrap_or_default()
    );
    Json(json!({ "candidates": [{ "content": { "parts": [{ "text": text }] } }] }))
}

#[tokio::test]
async fn openai_client_posts_chat_completion() {
    let base = serve(Router::new().route("/chat/completions", post(openai_completions))).await;
    let client = OpenAiClient::new(settings(&base), 0.5, Duration::from_secs(5));
    let reply = client.complete("Hello").await.expect("reply");
    assert_eq!(reply, "Bearer secret|test-model|0.5|Hello");
}

#[tokio::test]
async fn gemini_client_calls_generate_content() {
    let base = serve(Router::new().route("/models/:action", post(gemini_generate))).await;
    let client = GeminiClient::new(settings(&base), 0.3, Duration::from_secs(5));
    let reply = client.complete("Hi there").await.expect("reply");
    assert_eq!(reply, "test-model:generateContent|secret|Hi there");
}

#[tokio::test]
async fn provider_error_status_is_reported_with_body() {
    let app = Router::new().route(
        "/chat/completions",
        post(|| async { (StatusCode::UNAUTHORIZED, "invalid api key") }),
    );
    let base = serve(app).await;
    let client = OpenAiClient::new(settings(&base), 0.3, Duration::from_secs(5));
    match client.complete("Hello").await {
        Err(LlmError::Api(msg)) => {
            assert!(msg.starts_with("401"), "{}", msg);
            assert!(msg.contains("invalid api key"), "{}", msg);
        }
        other => panic!("expected api error, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn empty_candidates_are_an_empty_reply() {
    let app = Router::new().route(
        "/models/:action",
        post(|| async { Json(json!({ "candidates": [] })) }),
    );
    let base = serve(app).await;
    let client = GeminiClient::new(settings(&base), 0.3, Duration::from_secs(5));
    let err = client.complete("Hi").await.expect_err("no candidates");
    assert!(matches!(err, LlmError::EmptyReply));
    assert_eq!(err.kind(), "provider_error");
}

#[tokio::test]
async fn missing_key_fails_before_any_request() {
    let mut s = settings("http://127.0.0.1:9");
    s.api_key = None;
    let client = OpenAiClient::new(s, 0.3, Duration::from_secs(5));
    let err = client.complete("Hello").await.expect_err("missing key");
    assert_eq!(err.to_string(), "OPENAI_API_KEY is not set.");
    assert_eq!(err.kind(), "missing_credentials");
}

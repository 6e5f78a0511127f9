//! Relay integration tests
//!
//! Drive the full router against a mock upstream and check the response, the
//! ledger balance and the usage log after the settlement queue drains.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use httpmock::prelude::*;
use relaygate::config::{AppConfig, Settings};
use relaygate::services::usage::TokenCounter;
use relaygate::services::QuotaLedger;
use relaygate::{create_router, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const CLIENT_KEY: &str = "sk-client-0001";
const TOKEN_ID: &str = "tok-1";

/// One token per whitespace-separated word
struct WordCounter;

impl TokenCounter for WordCounter {
    fn count_tokens(&self, text: &str, _model: &str) -> u32 {
        text.split_whitespace().count() as u32
    }
}

fn app_config(channel: Value, quota: i64) -> AppConfig {
    let config = json!({
        "channel": channel,
        "pricing": {
            "modelRatio": { "gpt-4": 1.0, "gpt-4o": 2.0, "claude-3-haiku": 1.0 },
            "groupRatio": { "default": 1.0 }
        },
        "tokens": {
            CLIENT_KEY: { "id": TOKEN_ID, "group": "default", "quota": quota }
        }
    });
    AppConfig::from_json(&config.to_string()).unwrap()
}

fn openai_channel(base_url: &str) -> Value {
    json!({ "id": 7, "type": "openai", "baseUrl": base_url, "apiKey": "sk-upstream" })
}

fn build(config: AppConfig) -> (Arc<AppState>, Router) {
    let state = Arc::new(AppState::with_counter(Settings::default(), config, Arc::new(WordCounter)).unwrap());
    let app = create_router(state.clone());
    (state, app)
}

fn chat_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {}", CLIENT_KEY))
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// "hello there" from a user: (3 + 1 + 2) + 3 = 9 estimated prompt tokens
fn hello_body() -> Value {
    json!({
        "model": "gpt-4",
        "messages": [{ "role": "user", "content": "hello there" }]
    })
}

fn completion_response() -> Value {
    json!({
        "id": "chatcmpl-upstream-1",
        "object": "chat.completion",
        "created": 1700000000,
        "model": "gpt-4",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": "General Kenobi" },
            "finish_reason": "stop"
        }],
        "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
    })
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

async fn settled_balance(state: &AppState) -> i64 {
    state.settlement.shutdown().await;
    state.ledger.balance(TOKEN_ID).await.unwrap()
}

#[tokio::test]
async fn test_success_settles_reported_usage() {
    let server = MockServer::start_async().await;
    let upstream = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .header("authorization", "Bearer sk-upstream")
                .json_body_partial(r#"{"model": "gpt-4"}"#);
            then.status(200)
                .header("content-type", "application/json")
                .json_body(completion_response());
        })
        .await;

    let (state, app) = build(app_config(openai_channel(&server.base_url()), 1000));

    let response = app.oneshot(chat_request(hello_body())).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["id"], "chatcmpl-upstream-1");
    assert_eq!(body["choices"][0]["message"]["content"], "General Kenobi");

    // reserved 9, settled at 10 + 5
    assert_eq!(settled_balance(&state).await, 985);
    upstream.assert_async().await;

    let logs = state.ledger.usage_logs().await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].quota, 15);
    assert_eq!(logs[0].channel_id, 7);
    assert_eq!(logs[0].prompt_tokens, 10);
    assert_eq!(logs[0].completion_tokens, 5);
    assert!(!logs[0].is_stream);
}

#[tokio::test]
async fn test_insufficient_quota_never_dispatches() {
    let server = MockServer::start_async().await;
    let upstream = server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200).json_body(completion_response());
        })
        .await;

    let (state, app) = build(app_config(openai_channel(&server.base_url()), 5));

    let response = app.oneshot(chat_request(hello_body())).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "insufficient_quota");

    assert_eq!(upstream.hits_async().await, 0);
    assert_eq!(settled_balance(&state).await, 5);
    assert!(state.ledger.usage_logs().await.is_empty());
}

#[tokio::test]
async fn test_upstream_error_is_refunded_and_relayed() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(429).json_body(json!({
                "error": { "message": "rate limited", "type": "rate_limit_error", "code": "rate_limit" }
            }));
        })
        .await;

    let (state, app) = build(app_config(openai_channel(&server.base_url()), 1000));

    let response = app.oneshot(chat_request(hello_body())).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = body_json(response).await;
    assert_eq!(body["error"]["message"], "rate limited");
    assert_eq!(body["error"]["type"], "rate_limit_error");
    assert_eq!(body["error"]["code"], "rate_limit");

    assert_eq!(settled_balance(&state).await, 1000);
    assert!(state.ledger.usage_logs().await.is_empty());
}

#[tokio::test]
async fn test_unparseable_upstream_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(503).body("upstream overloaded");
        })
        .await;

    let (state, app) = build(app_config(openai_channel(&server.base_url()), 1000));

    let response = app.oneshot(chat_request(hello_body())).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "bad_response_status_code");
    assert_eq!(body["error"]["type"], "upstream_error");
    assert_eq!(body["error"]["message"], "bad response status code 503");

    assert_eq!(settled_balance(&state).await, 1000);
}

#[tokio::test]
async fn test_transport_failure_is_refunded() {
    // nothing listens on port 9 locally
    let (state, app) = build(app_config(openai_channel("http://127.0.0.1:9"), 1000));

    let response = app.oneshot(chat_request(hello_body())).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "do_request_failed");

    assert_eq!(settled_balance(&state).await, 1000);
}

#[tokio::test]
async fn test_error_object_in_ok_body_is_refunded() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200).json_body(json!({
                "error": { "message": "model overloaded", "type": "server_error", "code": null }
            }));
        })
        .await;

    let (state, app) = build(app_config(openai_channel(&server.base_url()), 1000));

    let response = app.oneshot(chat_request(hello_body())).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"]["message"], "model overloaded");
    assert_eq!(body["error"]["type"], "server_error");

    assert_eq!(settled_balance(&state).await, 1000);
}

#[tokio::test]
async fn test_mapped_model_is_rewritten_and_priced() {
    let server = MockServer::start_async().await;
    let upstream = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .json_body_partial(r#"{"model": "gpt-4o"}"#);
            then.status(200)
                .header("content-type", "application/json")
                .json_body(completion_response());
        })
        .await;

    let mut channel = openai_channel(&server.base_url());
    channel["modelMapping"] = json!({ "gpt-4": "gpt-4o" });
    let (state, app) = build(app_config(channel, 1000));

    let response = app.oneshot(chat_request(hello_body())).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    upstream.assert_async().await;

    // gpt-4o is priced at 2.0: (10 + 5) * 2
    assert_eq!(settled_balance(&state).await, 970);

    let logs = state.ledger.usage_logs().await;
    assert_eq!(logs[0].origin_model, "gpt-4");
    assert_eq!(logs[0].actual_model, "gpt-4o");
    assert_eq!(logs[0].quota, 30);
}

#[tokio::test]
async fn test_empty_upstream_usage_falls_back_to_estimate() {
    let server = MockServer::start_async().await;
    let mut response_body = completion_response();
    response_body["usage"] = json!({ "prompt_tokens": 0, "completion_tokens": 0, "total_tokens": 0 });
    server
        .mock_async(move |when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(response_body.clone());
        })
        .await;

    let (state, app) = build(app_config(openai_channel(&server.base_url()), 1000));

    let response = app.oneshot(chat_request(hello_body())).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // 9 estimated prompt tokens plus "General Kenobi" counted as 2
    assert_eq!(settled_balance(&state).await, 989);
}

#[tokio::test]
async fn test_azure_routes_through_deployment() {
    let server = MockServer::start_async().await;
    let upstream = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/openai/deployments/gpt4-prod/chat/completions")
                .query_param("api-version", "2024-02-01")
                .header("api-key", "sk-upstream");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(completion_response());
        })
        .await;

    let channel = json!({
        "type": "azure",
        "baseUrl": server.base_url(),
        "apiKey": "sk-upstream",
        "config": {
            "deployment_configs": [
                { "model_name": "gpt-4", "deployment_name": "gpt4-prod", "api_version": "2024-02-01" }
            ]
        }
    });
    let (state, app) = build(app_config(channel, 1000));

    let response = app.oneshot(chat_request(hello_body())).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    upstream.assert_async().await;
    assert_eq!(settled_balance(&state).await, 985);
}

#[tokio::test]
async fn test_azure_missing_deployment_leaves_quota_untouched() {
    let server = MockServer::start_async().await;
    let upstream = server
        .mock_async(|when, then| {
            when.method(POST);
            then.status(200).json_body(completion_response());
        })
        .await;

    let channel = json!({
        "type": "azure",
        "baseUrl": server.base_url(),
        "apiKey": "sk-upstream",
        "config": {
            "deployment_configs": [
                { "model_name": "gpt-35-turbo", "deployment_name": "gpt35", "api_version": "2024-02-01" }
            ]
        }
    });
    let (state, app) = build(app_config(channel, 1000));

    let response = app.oneshot(chat_request(hello_body())).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "deployment_config_not_found");

    assert_eq!(upstream.hits_async().await, 0);
    assert_eq!(settled_balance(&state).await, 1000);
}

#[tokio::test]
async fn test_stream_is_relayed_and_settled() {
    let server = MockServer::start_async().await;
    let sse = concat!(
        "data: {\"id\":\"c1\",\"object\":\"chat.completion.chunk\",\"created\":1,\"model\":\"gpt-4\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hello\"}}]}\n\n",
        "data: {\"id\":\"c1\",\"object\":\"chat.completion.chunk\",\"created\":1,\"model\":\"gpt-4\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\" world\"},\"finish_reason\":\"stop\"}],\"usage\":{\"prompt_tokens\":9,\"completion_tokens\":2,\"total_tokens\":11}}\n\n",
        "data: [DONE]\n\n",
    );
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200).header("content-type", "text/event-stream").body(sse);
        })
        .await;

    let (state, app) = build(app_config(openai_channel(&server.base_url()), 1000));

    let mut body = hello_body();
    body["stream"] = json!(true);
    let response = app.oneshot(chat_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get("content-type").unwrap().to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/event-stream"));

    let text = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(text.contains("\"Hello\""));
    assert!(text.contains("\" world\""));
    assert!(text.contains("[DONE]"));

    assert_eq!(settled_balance(&state).await, 989);
    let logs = state.ledger.usage_logs().await;
    assert_eq!(logs.len(), 1);
    assert!(logs[0].is_stream);
}

#[tokio::test]
async fn test_anthropic_channel_reframes_response() {
    let server = MockServer::start_async().await;
    let upstream = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/messages")
                .header("x-api-key", "sk-upstream")
                .header("anthropic-version", "2023-06-01")
                .json_body_partial(r#"{"model": "claude-3-haiku", "system": "be brief"}"#);
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({
                    "id": "msg_01",
                    "type": "message",
                    "role": "assistant",
                    "model": "claude-3-haiku",
                    "content": [{ "type": "text", "text": "Hi!" }],
                    "stop_reason": "end_turn",
                    "usage": { "input_tokens": 12, "output_tokens": 3 }
                }));
        })
        .await;

    let channel = json!({ "type": "anthropic", "baseUrl": server.base_url(), "apiKey": "sk-upstream" });
    let (state, app) = build(app_config(channel, 1000));

    let request = json!({
        "model": "claude-3-haiku",
        "messages": [
            { "role": "system", "content": "be brief" },
            { "role": "user", "content": "hello there" }
        ]
    });
    let response = app.oneshot(chat_request(request)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    upstream.assert_async().await;

    let body = body_json(response).await;
    assert_eq!(body["object"], "chat.completion");
    assert_eq!(body["choices"][0]["message"]["content"], "Hi!");
    assert_eq!(body["choices"][0]["finish_reason"], "stop");
    assert_eq!(body["usage"]["total_tokens"], 15);

    assert_eq!(settled_balance(&state).await, 985);
}

#[tokio::test]
async fn test_missing_and_unknown_token_rejected() {
    let (_state, app) = build(app_config(openai_channel("http://127.0.0.1:9"), 1000));

    let request = Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .header("content-type", "application/json")
        .body(Body::from(hello_body().to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "invalid_token");

    let request = Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .header("authorization", "Bearer sk-nobody")
        .body(Body::from(hello_body().to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // a configured key without the scheme is still rejected
    let request = Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .header("authorization", CLIENT_KEY)
        .body(Body::from(hello_body().to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_invalid_request_leaves_quota_untouched() {
    let server = MockServer::start_async().await;
    let upstream = server
        .mock_async(|when, then| {
            when.method(POST);
            then.status(200).json_body(completion_response());
        })
        .await;

    let (state, app) = build(app_config(openai_channel(&server.base_url()), 1000));

    let response = app
        .clone()
        .oneshot(chat_request(json!({ "model": "gpt-4", "messages": [] })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "invalid_text_request");
    assert_eq!(body["error"]["type"], "invalid_request_error");

    let malformed = Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .header("authorization", format!("Bearer {}", CLIENT_KEY))
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(malformed).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert_eq!(upstream.hits_async().await, 0);
    assert_eq!(settled_balance(&state).await, 1000);
}

#[tokio::test]
async fn test_embeddings_relay() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/embeddings");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({
                    "object": "list",
                    "data": [{ "object": "embedding", "index": 0, "embedding": [0.1, 0.2] }],
                    "model": "text-embedding-3-small",
                    "usage": { "prompt_tokens": 3, "total_tokens": 3 }
                }));
        })
        .await;

    let (state, app) = build(app_config(openai_channel(&server.base_url()), 1000));

    let request = Request::builder()
        .method("POST")
        .uri("/v1/embeddings")
        .header("authorization", format!("Bearer {}", CLIENT_KEY))
        .body(Body::from(
            json!({ "model": "text-embedding-3-small", "input": "one two three" }).to_string(),
        ))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"][0]["embedding"][1], 0.2);

    // unlisted model uses the default ratio of 30
    assert_eq!(settled_balance(&state).await, 1000 - 90);
}

#[tokio::test]
async fn test_unmapped_native_body_is_forwarded_verbatim() {
    let raw = "{ \"model\" : \"gpt-4\",\n  \"messages\": [ {\"role\":\"user\",  \"content\":\"hello there\"} ],\n  \"x_custom\": {\"keep\": [1, 2.50]} }";

    let server = MockServer::start_async().await;
    let upstream = server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions").body(raw);
            then.status(200)
                .header("content-type", "application/json")
                .json_body(completion_response());
        })
        .await;

    let (state, app) = build(app_config(openai_channel(&server.base_url()), 1000));

    let request = Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .header("authorization", format!("Bearer {}", CLIENT_KEY))
        .body(Body::from(raw))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    upstream.assert_async().await;

    assert_eq!(settled_balance(&state).await, 985);
}

#[tokio::test]
async fn test_unknown_content_parts_are_relayed() {
    let request = json!({
        "model": "gpt-4",
        "messages": [{ "role": "user", "content": [
            { "type": "text", "text": "hello there" },
            { "type": "input_audio", "input_audio": { "data": "UklGRg==", "format": "wav" } }
        ]}]
    });

    let server = MockServer::start_async().await;
    let expected = request.clone();
    let upstream = server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions").json_body(expected);
            then.status(200)
                .header("content-type", "application/json")
                .json_body(completion_response());
        })
        .await;

    let (state, app) = build(app_config(openai_channel(&server.base_url()), 1000));

    let response = app.oneshot(chat_request(request)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    upstream.assert_async().await;
    assert_eq!(settled_balance(&state).await, 985);
}

#[tokio::test]
async fn test_baichuan_drops_zero_frequency_penalty() {
    let server = MockServer::start_async().await;
    let upstream = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .header("authorization", "Bearer sk-upstream")
                .json_body(json!({
                    "model": "Baichuan2",
                    "messages": [{ "role": "user", "content": "hello there" }],
                    "temperature": 0.5,
                    "x_custom": true
                }));
            then.status(200)
                .header("content-type", "application/json")
                .json_body(completion_response());
        })
        .await;

    let channel = json!({ "id": 7, "type": "baichuan", "baseUrl": server.base_url(), "apiKey": "sk-upstream" });
    let (state, app) = build(app_config(channel, 1000));

    let request = json!({
        "model": "Baichuan2",
        "messages": [{ "role": "user", "content": "hello there" }],
        "temperature": 0.5,
        "frequency_penalty": 0,
        "x_custom": true
    });
    let response = app.oneshot(chat_request(request)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    upstream.assert_async().await;

    // unlisted model: 15 tokens at the default ratio of 30
    assert_eq!(settled_balance(&state).await, 1000 - 450);
}

#[tokio::test]
async fn test_conversion_failure_is_refunded() {
    let server = MockServer::start_async().await;
    let upstream = server
        .mock_async(|when, then| {
            when.any_request();
            then.status(200);
        })
        .await;

    let channel = json!({ "type": "anthropic", "baseUrl": server.base_url(), "apiKey": "sk-upstream" });
    let (state, app) = build(app_config(channel, 1000));

    let request = Request::builder()
        .method("POST")
        .uri("/v1/embeddings")
        .header("authorization", format!("Bearer {}", CLIENT_KEY))
        .body(Body::from(json!({ "model": "claude-3-haiku", "input": "one two three" }).to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "convert_request_failed");

    assert_eq!(upstream.hits_async().await, 0);
    assert_eq!(settled_balance(&state).await, 1000);
    assert!(state.ledger.usage_logs().await.is_empty());
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let (state, app) = build(app_config(openai_channel("http://127.0.0.1:9"), 1000));

    let oversized = "a".repeat(state.settings.request.max_request_size + 1);
    let request = json!({
        "model": "gpt-4",
        "messages": [{ "role": "user", "content": oversized }]
    });
    let response = app.oneshot(chat_request(request)).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(settled_balance(&state).await, 1000);
}

#[tokio::test]
async fn test_health_needs_no_token() {
    let (_state, app) = build(app_config(openai_channel("http://127.0.0.1:9"), 1000));

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["details"]["tokens"], 1);

    let response = app
        .oneshot(Request::builder().uri("/health/live").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

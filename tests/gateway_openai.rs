use std::sync::Arc;
use std::time::Duration;

use jeopardy_rerank::gateway::openai::{ChatProvider, OpenAiAdapter};
use jeopardy_rerank::gateway::{
    Attribution, ChatModel, ChatRequest, FinishReason, Message, NoopUsageSink, ProviderConfig,
    ProviderError, ProviderGateway, UsageTally,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn adapter_for(server: &MockServer) -> OpenAiAdapter {
    let config = ProviderConfig::new("sk-test")
        .base_url(server.uri())
        .timeout(Duration::from_secs(5));
    OpenAiAdapter::new(&config).unwrap()
}

fn request() -> ChatRequest {
    ChatRequest::new(
        ChatModel::new("gpt-4o-mini"),
        vec![Message::system("sys"), Message::user("hi")],
        Attribution::new("test"),
    )
    .max_tokens(500)
}

#[tokio::test]
async fn adapter_sends_model_messages_and_limits() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "temperature": 0.0,
            "max_tokens": 500,
            "messages": [
                { "role": "system", "content": "sys" },
                { "role": "user", "content": "hi" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "1. a" }, "finish_reason": "stop" }],
            "usage": { "prompt_tokens": 1, "completion_tokens": 1 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let resp = adapter_for(&server).chat(&request()).await.unwrap();
    assert_eq!(resp.content, "1. a");
}

#[tokio::test]
async fn adapter_parses_content_usage_and_request_id() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-request-id", "req-7")
                .set_body_json(json!({
                    "choices": [{
                        "message": { "content": "1. London\n2. Paris" },
                        "finish_reason": "stop"
                    }],
                    "usage": { "prompt_tokens": 100, "completion_tokens": 20 }
                })),
        )
        .mount(&server)
        .await;

    let resp = adapter_for(&server).chat(&request()).await.unwrap();
    assert_eq!(resp.content, "1. London\n2. Paris");
    assert_eq!(resp.finish_reason, FinishReason::Stop);
    assert_eq!(resp.input_tokens, 100);
    assert_eq!(resp.output_tokens, 20);
    assert_eq!(
        resp.cost_nanodollars,
        jeopardy_rerank::gateway::chat_cost("gpt-4o-mini", 100, 20)
    );
    assert_eq!(resp.request_id.as_deref(), Some("req-7"));
}

#[tokio::test]
async fn adapter_maps_server_error_with_context() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(500)
                .insert_header("x-request-id", "abc123")
                .set_body_json(json!({
                    "error": { "message": "upstream failure", "code": "server_error" }
                })),
        )
        .mount(&server)
        .await;

    let err = adapter_for(&server).chat(&request()).await.unwrap_err();
    match err {
        ProviderError::Upstream { message, context } => {
            assert_eq!(message, "upstream failure");
            let ctx = context;
            assert_eq!(ctx.http_status, Some(500));
            assert_eq!(ctx.provider_code.as_deref(), Some("server_error"));
            assert_eq!(ctx.request_id.as_deref(), Some("abc123"));
        }
        other => panic!("expected Upstream error, got {other:?}"),
    }
}

#[tokio::test]
async fn adapter_classifies_rate_limit_and_auth_failures() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": { "message": "slow down", "code": "rate_limit_exceeded" }
        })))
        .mount(&server)
        .await;

    let err = adapter_for(&server).chat(&request()).await.unwrap_err();
    match &err {
        ProviderError::RateLimited {
            retry_after,
            context,
        } => {
            assert_eq!(*retry_after, None);
            assert_eq!(context.provider_code.as_deref(), Some("rate_limit_exceeded"));
        }
        other => panic!("expected RateLimited, got {other:?}"),
    }
    assert!(!err.to_string().contains("retry after"));

    server.reset().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "12")
                .set_body_string("busy"),
        )
        .mount(&server)
        .await;

    let err = adapter_for(&server).chat(&request()).await.unwrap_err();
    match err {
        ProviderError::RateLimited { retry_after, .. } => {
            assert_eq!(retry_after, Some(Duration::from_secs(12)))
        }
        other => panic!("expected RateLimited, got {other:?}"),
    }

    server.reset().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("nope"))
        .mount(&server)
        .await;

    let err = adapter_for(&server).chat(&request()).await.unwrap_err();
    match err {
        ProviderError::Unauthorized { message, .. } => assert_eq!(message, "HTTP 401"),
        other => panic!("expected Unauthorized, got {other:?}"),
    }
}

#[tokio::test]
async fn adapter_rejects_malformed_bodies() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;
    let err = adapter_for(&server).chat(&request()).await.unwrap_err();
    assert_eq!(err.code(), "malformed_response");

    server.reset().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;
    let err = adapter_for(&server).chat(&request()).await.unwrap_err();
    assert!(err.to_string().contains("No choices"));
}

#[tokio::test]
async fn adapter_detects_refusal_from_content() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": { "content": "I cannot help with ranking these." },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 1, "completion_tokens": 1 }
        })))
        .mount(&server)
        .await;

    let err = adapter_for(&server).chat(&request()).await.unwrap_err();
    assert!(matches!(err, ProviderError::Refused { .. }));
}

#[tokio::test]
async fn gateway_does_not_retry_and_records_usage() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .expect(1)
        .mount(&server)
        .await;

    let usage = Arc::new(UsageTally::new());
    let gateway = ProviderGateway::with_adapter(adapter_for(&server), usage.clone());

    let err = gateway.chat(request()).await.unwrap_err();
    assert_eq!(err.code(), "upstream_error");

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);

    let totals = usage.totals();
    assert_eq!(totals.calls, 1);
    assert_eq!(totals.errors, 1);
}

#[tokio::test]
async fn gateway_passes_success_through() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "ok" }, "finish_reason": "stop" }],
            "usage": { "prompt_tokens": 3, "completion_tokens": 4 }
        })))
        .mount(&server)
        .await;

    let gateway = ProviderGateway::with_adapter(adapter_for(&server), Arc::new(NoopUsageSink));
    let resp = gateway.chat(request()).await.unwrap();
    assert_eq!(resp.content, "ok");
    assert_eq!(resp.input_tokens + resp.output_tokens, 7);
}

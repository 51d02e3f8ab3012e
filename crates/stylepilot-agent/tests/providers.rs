//! Wire-level tests for each vendor adapter, driven through `LlmClient`.

mod common;

use serde_json::json;
use stylepilot_agent::{
    AgentError, CompletionRequest, Credential, LlmClient, Message, Provider, ProviderConfig,
    tool_definitions,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{SCREENSHOT, request_bodies};

fn request(provider: Provider, base_url: &str) -> CompletionRequest {
    let config = ProviderConfig::new(provider, "", Credential::api_key("sk-test"))
        .with_base_url(base_url);
    CompletionRequest::new(
        config,
        vec![Message::user_with_image("Make the header blue", SCREENSHOT)],
    )
    .with_system("You write CSS.")
    .with_tools(tool_definitions())
    .with_temperature(Some(0.2))
    .with_max_tokens(Some(1024))
}

#[tokio::test]
async fn openai_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "inspect", "arguments": "{\"selector\":\"header\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 120, "completion_tokens": 14}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = LlmClient::new()
        .unwrap()
        .complete(&request(Provider::OpenAi, &server.uri()))
        .await
        .unwrap();

    assert_eq!(result.provider, Provider::OpenAi);
    assert_eq!(result.model, "gpt-4o-mini");
    assert_eq!(result.tool_calls.len(), 1);
    assert_eq!(result.tool_calls[0].id, "call_1");
    assert_eq!(result.tool_calls[0].arguments, json!({"selector": "header"}));
    assert_eq!(result.usage.input_tokens, 120);

    let bodies = request_bodies(&server).await;
    let body = &bodies[0];
    assert_eq!(body["messages"][0]["content"], "You write CSS.");
    assert_eq!(body["messages"][1]["content"][1]["type"], "image_url");
    assert_eq!(body["tools"][0]["type"], "function");
    assert_eq!(body["max_tokens"], 1024);
}

#[tokio::test]
async fn anthropic_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "sk-test"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "type": "message",
            "role": "assistant",
            "content": [
                {"type": "text", "text": "Let me look."},
                {"type": "tool_use", "id": "toolu_1", "name": "get_color_palette", "input": {}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 300, "output_tokens": 22}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = LlmClient::new()
        .unwrap()
        .complete(&request(Provider::Anthropic, &server.uri()))
        .await
        .unwrap();

    assert_eq!(result.text, "Let me look.");
    assert_eq!(result.tool_calls[0].id, "toolu_1");
    assert_eq!(result.tool_calls[0].name, "get_color_palette");
    assert_eq!(result.usage.output_tokens, 22);

    let bodies = request_bodies(&server).await;
    let body = &bodies[0];
    assert_eq!(body["model"], "claude-sonnet-4-20250514");
    assert_eq!(body["system"], "You write CSS.");
    assert_eq!(body["max_tokens"], 1024);
    assert_eq!(body["messages"][0]["content"][1]["type"], "image");
    assert_eq!(body["messages"][0]["content"][1]["source"]["type"], "base64");
    assert!(body["tools"][0].get("input_schema").is_some());
}

#[tokio::test]
async fn google_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
        .and(header("x-goog-api-key", "sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        {"text": "thinking about colors", "thought": true},
                        {"functionCall": {"name": "check_contrast", "args": {
                            "foreground": "#fff", "background": "#1a73e8"
                        }}}
                    ]
                },
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 80, "candidatesTokenCount": 9}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = LlmClient::new()
        .unwrap()
        .complete(&request(Provider::Google, &server.uri()))
        .await
        .unwrap();

    assert_eq!(result.text, "");
    assert_eq!(result.tool_calls.len(), 1);
    assert!(result.tool_calls[0].id.starts_with("call_"));
    assert_eq!(result.tool_calls[0].arguments["background"], "#1a73e8");

    let bodies = request_bodies(&server).await;
    let body = &bodies[0];
    assert_eq!(body["systemInstruction"]["parts"][0]["text"], "You write CSS.");
    assert_eq!(body["contents"][0]["role"], "user");
    assert!(body["contents"][0]["parts"][1].get("inlineData").is_some());
    assert!(body["tools"][0].get("functionDeclarations").is_some());
}

#[tokio::test]
async fn error_status_maps_to_provider_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "type": "error",
            "error": {"type": "authentication_error", "message": "invalid x-api-key"}
        })))
        .mount(&server)
        .await;

    let err = LlmClient::new()
        .unwrap()
        .complete(&request(Provider::Anthropic, &server.uri()))
        .await
        .unwrap_err();

    match err {
        AgentError::Provider {
            provider,
            status,
            message,
        } => {
            assert_eq!(provider, "anthropic");
            assert_eq!(status, Some(401));
            assert!(message.contains("invalid x-api-key"), "{message}");
        }
        other => panic!("expected provider error, got {other:?}"),
    }
}

#[tokio::test]
async fn non_json_error_body_is_echoed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway from proxy"))
        .mount(&server)
        .await;

    let err = LlmClient::new()
        .unwrap()
        .complete(&request(Provider::OpenAi, &server.uri()))
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(err.to_string(), "openai error (502): bad gateway from proxy");
}

#[tokio::test]
async fn empty_success_is_empty_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [],
            "promptFeedback": {"blockReason": "SAFETY"}
        })))
        .mount(&server)
        .await;

    let err = LlmClient::new()
        .unwrap()
        .complete(&request(Provider::Google, &server.uri()))
        .await
        .unwrap_err();

    match err {
        AgentError::EmptyResponse { provider, detail } => {
            assert_eq!(provider, "google");
            assert_eq!(detail.as_deref(), Some("blocked: SAFETY"));
        }
        other => panic!("expected empty response, got {other:?}"),
    }
}

#[tokio::test]
async fn custom_endpoint_gets_extra_headers_and_no_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("x-tenant", "acme"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::openai_text("ok")))
        .expect(1)
        .mount(&server)
        .await;

    let config = ProviderConfig::new(Provider::Custom, "llama3.1", Credential::None)
        .with_base_url(format!("{}/v1/", server.uri()))
        .with_header("x-tenant", "acme");
    let result = LlmClient::new()
        .unwrap()
        .complete(&CompletionRequest::new(config, vec![Message::user("hi")]))
        .await
        .unwrap();
    assert_eq!(result.text, "ok");

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn unreachable_endpoint_is_transport_error() {
    let err = LlmClient::new()
        .unwrap()
        .complete(&request(Provider::OpenAi, "http://127.0.0.1:1"))
        .await
        .unwrap_err();
    assert!(matches!(err, AgentError::Transport { .. }), "{err:?}");
}

// crates/expense-chat/tests/openai_client.rs
// ============================================================================
// Module: OpenAI Client Tests
// Description: Wire behavior of the chat-completions client against a stub.
// Purpose: Validate routing, authentication headers, and response limits.
// Dependencies: expense-chat, expense-config, tiny_http
// ============================================================================
//! ## Overview
//! A one-shot `tiny_http` server records the request it receives and answers
//! with a canned body, letting tests assert both directions of the exchange.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::sync::mpsc;
use std::thread;

use expense_chat::ChatError;
use expense_chat::ChatModel;
use expense_chat::ModelMessage;
use expense_chat::OpenAiChatClient;
use expense_chat::tool_definitions;
use expense_config::ChatConfig;
use expense_config::ChatProvider;
use serde_json::Value;
use tiny_http::Header;
use tiny_http::Response;
use tiny_http::Server;

// ============================================================================
// SECTION: Helpers
// ============================================================================

struct Captured {
    url: String,
    authorization: Option<String>,
    api_key: Option<String>,
    body: Value,
}

fn header_value(request: &tiny_http::Request, name: &'static str) -> Option<String> {
    request
        .headers()
        .iter()
        .find(|header| header.field.equiv(name))
        .map(|header| header.value.as_str().to_string())
}

fn spawn_stub(
    status: u16,
    body: String,
) -> (String, mpsc::Receiver<Captured>, thread::JoinHandle<()>) {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let (sender, receiver) = mpsc::channel();
    let handle = thread::spawn(move || {
        if let Ok(mut request) = server.recv() {
            let mut raw = String::new();
            request.as_reader().read_to_string(&mut raw).unwrap();
            let captured = Captured {
                url: request.url().to_string(),
                authorization: header_value(&request, "Authorization"),
                api_key: header_value(&request, "api-key"),
                body: serde_json::from_str(&raw).unwrap_or(Value::Null),
            };
            let _ = sender.send(captured);
            let content_type =
                Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap();
            let response =
                Response::from_string(body).with_status_code(status).with_header(content_type);
            let _ = request.respond(response);
        }
    });
    (format!("http://{addr}"), receiver, handle)
}

fn config(provider: ChatProvider, endpoint: String) -> ChatConfig {
    ChatConfig {
        enabled: true,
        provider,
        endpoint: Some(endpoint),
        allow_http: true,
        timeout_ms: 5_000,
        ..ChatConfig::default()
    }
}

fn tool_call_body() -> String {
    serde_json::json!({
        "id": "chatcmpl-1",
        "choices": [{
            "index": 0,
            "finish_reason": "tool_calls",
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_abc",
                    "type": "function",
                    "function": {"name": "get_pending_expenses", "arguments": "{}"}
                }]
            }
        }]
    })
    .to_string()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn openai_compatible_posts_bearer_request_with_tools() {
    let (url, captured, handle) = spawn_stub(200, tool_call_body());
    let client = OpenAiChatClient::new(
        &config(ChatProvider::OpenaiCompatible, format!("{url}/v1")),
        Some("sk-test".to_string()),
    )
    .unwrap();
    let completion =
        client.complete(&[ModelMessage::user("what is pending?")], &tool_definitions()).unwrap();
    assert!(completion.wants_tools());
    assert_eq!(completion.message.tool_calls[0].id, "call_abc");

    let request = captured.recv().unwrap();
    assert_eq!(request.url, "/v1/chat/completions");
    assert_eq!(request.authorization.as_deref(), Some("Bearer sk-test"));
    assert!(request.api_key.is_none());
    assert_eq!(request.body["model"], "gpt-4o");
    assert_eq!(request.body["tool_choice"], "auto");
    assert_eq!(request.body["tools"].as_array().unwrap().len(), 6);
    assert_eq!(request.body["messages"][0]["role"], "user");
    handle.join().unwrap();
}

#[test]
fn azure_routes_through_deployment_with_api_key_header() {
    let body = serde_json::json!({
        "choices": [{"finish_reason": "stop", "message": {"role": "assistant", "content": "Hi"}}]
    })
    .to_string();
    let (url, captured, handle) = spawn_stub(200, body);
    let config = config(ChatProvider::AzureOpenai, url);
    let client = OpenAiChatClient::new(&config, Some("azure-key".to_string())).unwrap();
    let completion = client.complete(&[ModelMessage::user("hi")], &[]).unwrap();
    assert!(!completion.wants_tools());
    assert_eq!(completion.message.content.as_deref(), Some("Hi"));

    let request = captured.recv().unwrap();
    assert_eq!(request.url, "/openai/deployments/gpt-4o/chat/completions?api-version=2024-10-21");
    assert_eq!(request.api_key.as_deref(), Some("azure-key"));
    assert!(request.authorization.is_none());
    assert!(request.body.get("model").is_none());
    assert!(request.body.get("tools").is_none());
    handle.join().unwrap();
}

#[test]
fn non_success_status_is_reported() {
    let (url, _captured, handle) = spawn_stub(429, "{}".to_string());
    let client =
        OpenAiChatClient::new(&config(ChatProvider::OpenaiCompatible, url), None).unwrap();
    let err = client.complete(&[ModelMessage::user("hi")], &[]).unwrap_err();
    assert_eq!(err, ChatError::Status(429));
    handle.join().unwrap();
}

#[test]
fn redirects_are_not_followed() {
    let (url, _captured, handle) = spawn_stub(302, String::new());
    let client =
        OpenAiChatClient::new(&config(ChatProvider::OpenaiCompatible, url), None).unwrap();
    let err = client.complete(&[ModelMessage::user("hi")], &[]).unwrap_err();
    assert_eq!(err, ChatError::Status(302));
    handle.join().unwrap();
}

#[test]
fn oversized_responses_are_rejected() {
    let (url, _captured, handle) = spawn_stub(200, tool_call_body());
    let mut config = config(ChatProvider::OpenaiCompatible, url);
    config.max_response_bytes = 16;
    let client = OpenAiChatClient::new(&config, None).unwrap();
    let err = client.complete(&[ModelMessage::user("hi")], &[]).unwrap_err();
    assert!(matches!(err, ChatError::Protocol(message) if message.contains("size limit")));
    handle.join().unwrap();
}

#[test]
fn responses_without_choices_are_protocol_errors() {
    let (url, _captured, handle) = spawn_stub(200, r#"{"choices": []}"#.to_string());
    let client =
        OpenAiChatClient::new(&config(ChatProvider::OpenaiCompatible, url), None).unwrap();
    let err = client.complete(&[ModelMessage::user("hi")], &[]).unwrap_err();
    assert!(matches!(err, ChatError::Protocol(_)));
    handle.join().unwrap();
}

#[test]
fn cleartext_endpoint_requires_opt_in() {
    let mut config = config(ChatProvider::OpenaiCompatible, "http://127.0.0.1:1".to_string());
    config.allow_http = false;
    let Err(err) = OpenAiChatClient::new(&config, None) else {
        panic!("expected config error");
    };
    assert!(matches!(err, ChatError::Config(_)));
}

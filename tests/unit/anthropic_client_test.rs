use serde_json::json;
use talktodata::services::anthropic_client::ANTHROPIC_VERSION;
use talktodata::services::{AnthropicClient, LlmError};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> AnthropicClient {
    AnthropicClient::new(format!("{}/", server.uri()), "sk-ant-test".to_string()).unwrap()
}

#[tokio::test]
async fn test_complete_sends_messages_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "sk-ant-test"))
        .and(header("anthropic-version", ANTHROPIC_VERSION))
        .and(body_partial_json(json!({
            "model": "claude-test",
            "max_tokens": 256,
            "messages": [{"role": "user", "content": "Count the orders"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [
                {"type": "text", "text": "SELECT COUNT(*) "},
                {"type": "tool_use", "id": "ignored"},
                {"type": "text", "text": "FROM orders"}
            ],
            "usage": {"input_tokens": 200, "output_tokens": 12}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let completion = client(&server)
        .complete("claude-test", "Count the orders", 256, 0.0)
        .await
        .unwrap();

    assert_eq!(completion.text, "SELECT COUNT(*) FROM orders");
    assert_eq!(completion.input_tokens, 200);
    assert_eq!(completion.output_tokens, 12);
    assert_eq!(completion.total_tokens(), 212);
}

#[tokio::test]
async fn test_missing_usage_counts_as_zero() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": "SELECT 1"}]
        })))
        .mount(&server)
        .await;

    let completion = client(&server)
        .complete("claude-test", "one", 16, 0.0)
        .await
        .unwrap();
    assert_eq!(completion.total_tokens(), 0);
}

#[tokio::test]
async fn test_api_error_carries_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid x-api-key"))
        .mount(&server)
        .await;

    let err = client(&server)
        .complete("claude-test", "hello", 16, 0.0)
        .await
        .unwrap_err();

    match &err {
        LlmError::ApiError { status, message } => {
            assert_eq!(*status, 401);
            assert_eq!(message, "invalid x-api-key");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(err.to_string(), "API error: 401 - invalid x-api-key");
}

#[tokio::test]
async fn test_response_without_text_is_invalid() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [],
            "usage": {"input_tokens": 5, "output_tokens": 0}
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .complete("claude-test", "hello", 16, 0.0)
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_unreachable_server_is_http_error() {
    let client = AnthropicClient::new("http://127.0.0.1:9".to_string(), "key".to_string()).unwrap();

    let err = client.complete("claude-test", "hello", 16, 0.0).await.unwrap_err();
    assert!(matches!(err, LlmError::HttpError(_)));
}

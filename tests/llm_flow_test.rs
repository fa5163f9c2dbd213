//! End-to-end flow tests against a mock OpenAI-compatible endpoint.

use finserver::config::LlmConfig;
use finserver::flows::{self, FlowError, OpenAiClient};

fn client_for(server: &mockito::ServerGuard) -> OpenAiClient {
    OpenAiClient::new(&LlmConfig {
        base_url: server.url(),
        api_key: "test-key".to_string(),
        model: "test-model".to_string(),
        request_timeout_secs: 5,
    })
}

fn completion_body(content: &str) -> String {
    serde_json::json!({
        "choices": [{ "message": { "content": content } }]
    })
    .to_string()
}

#[tokio::test]
async fn spending_insights_round_trip() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_header("authorization", "Bearer test-key")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(completion_body(r#"{"report": "A steady month with food trending up."}"#))
        .create_async()
        .await;

    let client = client_for(&server);
    let out = flows::spending_insights(&client, "2026-07-01,Coffee,Food,-4.50 USD")
        .await
        .unwrap();
    assert_eq!(out.report, "A steady month with food trending up.");
    mock.assert_async().await;
}

#[tokio::test]
async fn suggest_replies_parses_fenced_model_output() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(completion_body(
            "```json\n{\"suggestions\": [\"Thanks, that worked!\", \"Can you check my other card too?\"]}\n```",
        ))
        .create_async()
        .await;

    let client = client_for(&server);
    let out = flows::suggest_replies(&client, "Your card has been unblocked.")
        .await
        .unwrap();
    assert_eq!(out.suggestions.len(), 2);
    assert_eq!(out.suggestions[0], "Thanks, that worked!");
}

#[tokio::test]
async fn missing_content_surfaces_as_malformed() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"choices": []}"#)
        .create_async()
        .await;

    let client = client_for(&server);
    let result = flows::spending_insights(&client, "nothing").await;
    assert!(matches!(result, Err(FlowError::Malformed(_))));
}

#[tokio::test]
async fn non_json_response_surfaces_as_transport_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/chat/completions")
        .with_status(502)
        .with_body("bad gateway")
        .create_async()
        .await;

    let client = client_for(&server);
    let result = flows::suggest_replies(&client, "hello").await;
    assert!(matches!(result, Err(FlowError::Transport(_))));
}

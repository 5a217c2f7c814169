//! Integration tests for the Gemini backend against a mock HTTP server.

use mockito::{Matcher, Server};
use serde_json::json;
use taskdraft_core::{GeminiClient, GeminiConfig, GenerationParams, ModelClient, ModelError};

const PATH: &str = "/v1beta/models/gemma-3-4b-it:generateContent";

fn client_for(base_url: String) -> GeminiClient {
    let config = GeminiConfig {
        api_key: "test-key".to_string(),
        base_url,
        model: "gemma-3-4b-it".to_string(),
    };
    GeminiClient::new(config).expect("client should build")
}

fn candidate_body(text: &str) -> String {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP"
        }]
    })
    .to_string()
}

#[tokio::test]
async fn generate_returns_first_candidate_text() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", PATH)
        .match_header("x-goog-api-key", "test-key")
        .match_header("content-type", "application/json")
        .match_body(Matcher::PartialJson(json!({
            "contents": [{ "parts": [{ "text": "compiled prompt" }] }],
            "generationConfig": { "temperature": 0.0, "maxOutputTokens": 200 }
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(candidate_body("{\"title\":\"x\"}"))
        .create_async()
        .await;

    let client = client_for(server.url());
    let text = client
        .generate("compiled prompt", GenerationParams::deterministic(200))
        .await
        .expect("generate should succeed");

    assert_eq!(text, "{\"title\":\"x\"}");
    assert_eq!(client.name(), "gemini");
    mock.assert_async().await;
}

#[tokio::test]
async fn error_status_carries_backend_body() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", PATH)
        .with_status(500)
        .with_body("{\"error\":{\"message\":\"internal\"}}")
        .expect(1)
        .create_async()
        .await;

    let client = client_for(server.url());
    let err = client
        .generate("p", GenerationParams::deterministic(200))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ModelError::Status {
            status: 500,
            body: "{\"error\":{\"message\":\"internal\"}}".to_string(),
        }
    );
    // Exactly one attempt.
    mock.assert_async().await;
}

#[tokio::test]
async fn missing_candidates_is_empty_output() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "candidates": [] }).to_string())
        .create_async()
        .await;

    let client = client_for(server.url());
    let err = client
        .generate("p", GenerationParams::deterministic(700))
        .await
        .unwrap_err();
    assert_eq!(err, ModelError::EmptyOutput);
}

#[tokio::test]
async fn whitespace_text_is_empty_output() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", PATH)
        .with_status(200)
        .with_body(candidate_body("  \n "))
        .create_async()
        .await;

    let client = client_for(server.url());
    let err = client
        .generate("p", GenerationParams::deterministic(200))
        .await
        .unwrap_err();
    assert_eq!(err, ModelError::EmptyOutput);
}

#[tokio::test]
async fn non_json_success_body_is_malformed() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", PATH)
        .with_status(200)
        .with_body("<html>gateway</html>")
        .create_async()
        .await;

    let client = client_for(server.url());
    let err = client
        .generate("p", GenerationParams::deterministic(200))
        .await
        .unwrap_err();
    assert!(
        matches!(err, ModelError::MalformedResponse(_)),
        "got {err:?}"
    );
}

#[tokio::test]
async fn unreachable_backend_is_transport_error() {
    let client = client_for("http://127.0.0.1:1".to_string());
    let err = client
        .generate("p", GenerationParams::deterministic(200))
        .await
        .unwrap_err();
    assert!(matches!(err, ModelError::Transport(_)), "got {err:?}");
}

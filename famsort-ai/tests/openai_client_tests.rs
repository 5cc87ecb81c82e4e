//! OpenAI-compatible client tests against a mock HTTP endpoint

use famsort_ai::services::openai_client::OpenAiClient;
use famsort_ai::{ClassificationOracle, OracleError, Profile, ProfileSummarizer};
use famsort_common::config::OracleConfig;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer, max_retries: u32) -> OpenAiClient {
    let config = OracleConfig {
        endpoint: format!("{}/v1", server.uri()),
        timeout_secs: 5,
        max_retries,
        ..OracleConfig::default()
    };
    OpenAiClient::new(&config, "sk-test".to_string()).unwrap()
}

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "model": "gpt-test",
        "choices": [
            { "index": 0, "message": { "role": "assistant", "content": content }, "finish_reason": "stop" }
        ]
    })
}

#[tokio::test]
async fn test_summarize_sends_model_and_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({ "model": "gpt-3.5-turbo", "temperature": 0.5 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("  - loves chess  ")))
        .expect(1)
        .mount(&server)
        .await;

    let summary = client_for(&server, 0)
        .summarize(&[("hobby".to_string(), "chess".to_string())])
        .await
        .unwrap();

    assert_eq!(summary, "- loves chess");
}

#[tokio::test]
async fn test_classify_uses_system_message_and_classification_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({
            "model": "gpt-4o",
            "messages": [{ "role": "system" }, { "role": "user" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            r#"{"u1": {"family": "Group A", "notes": "ok"}}"#,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let raw = client_for(&server, 0)
        .classify("3 groups", &[Profile::new("u1", "likes hiking")])
        .await
        .unwrap();

    assert!(raw.contains("Group A"));
}

#[tokio::test]
async fn test_unauthorized_maps_to_invalid_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server, 3)
        .summarize(&[("a".to_string(), "b".to_string())])
        .await
        .unwrap_err();

    assert!(matches!(err, OracleError::InvalidApiKey));
}

#[tokio::test]
async fn test_server_error_without_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server, 0)
        .classify("", &[Profile::new("u1", "x")])
        .await
        .unwrap_err();

    match err {
        OracleError::Api { status, body } => {
            assert_eq!(status, 503);
            assert_eq!(body, "overloaded");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_transient_failure_retried_when_enabled() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("recovered")))
        .expect(1)
        .mount(&server)
        .await;

    let summary = client_for(&server, 1)
        .summarize(&[("a".to_string(), "b".to_string())])
        .await
        .unwrap();

    assert_eq!(summary, "recovered");
}

#[tokio::test]
async fn test_client_error_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server, 2)
        .summarize(&[("a".to_string(), "b".to_string())])
        .await
        .unwrap_err();

    assert!(matches!(err, OracleError::Api { status: 400, .. }));
}

#[tokio::test]
async fn test_empty_and_garbled_replies() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy</html>"))
        .mount(&server)
        .await;

    let client = client_for(&server, 0);
    let fields = [("a".to_string(), "b".to_string())];

    assert!(matches!(
        client.summarize(&fields).await,
        Err(OracleError::EmptyResponse)
    ));
    assert!(matches!(
        client.summarize(&fields).await,
        Err(OracleError::Parse(_))
    ));
}

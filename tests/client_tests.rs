//! HTTP classification client against a local mock endpoint

mod common;

use common::{chat_response, fast_config};
use mail_classifier::client::{ClassificationApi, HttpClassificationClient};
use mail_classifier::config::Config;
use mail_classifier::error::ClassifierError;
use serde_json::json;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> Config {
    let mut config = fast_config();
    config.api.endpoint = format!("{}/v1/chat/completions", server.uri());
    config
}

#[tokio::test]
async fn test_successful_classification_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "stream": false,
            "messages": [{"role": "user", "content": "Classify: invoice"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_response("  FYI\n")))
        .expect(1)
        .mount(&server)
        .await;

    let client = assert_ok!(HttpClassificationClient::from_config(&config_for(&server)));
    let content = assert_ok!(client.classify("Classify: invoice").await);
    assert_eq!(content, "FYI");
}

#[tokio::test]
async fn test_status_429_is_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;

    let client = HttpClassificationClient::from_config(&config_for(&server)).unwrap();
    let error = assert_err!(client.classify("x").await);
    assert!(error.is_rate_limit());
}

#[tokio::test]
async fn test_rate_limit_phrase_in_error_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(503)
                .set_body_json(json!({"error": {"message": "Rate limit reached for requests"}})),
        )
        .mount(&server)
        .await;

    let client = HttpClassificationClient::from_config(&config_for(&server)).unwrap();
    let error = assert_err!(client.classify("x").await);
    assert!(matches!(error, ClassifierError::RateLimited(_)));
}

#[tokio::test]
async fn test_server_error_is_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal failure"))
        .mount(&server)
        .await;

    let client = HttpClassificationClient::from_config(&config_for(&server)).unwrap();
    match client.classify("x").await {
        Err(ClassifierError::ApiError { status, body }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "internal failure");
        }
        other => panic!("expected ApiError, got {:?}", other),
    }
}

#[tokio::test]
async fn test_fallback_content_path() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": "URGENT"}]
        })))
        .mount(&server)
        .await;

    let client = HttpClassificationClient::from_config(&config_for(&server)).unwrap();
    assert_eq!(client.classify("x").await.unwrap(), "URGENT");
}

#[tokio::test]
async fn test_empty_content_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_response("")))
        .mount(&server)
        .await;

    let client = HttpClassificationClient::from_config(&config_for(&server)).unwrap();
    let error = assert_err!(client.classify("x").await);
    assert!(matches!(error, ClassifierError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_non_json_body_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let client = HttpClassificationClient::from_config(&config_for(&server)).unwrap();
    let error = assert_err!(client.classify("x").await);
    assert!(matches!(error, ClassifierError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_slow_endpoint_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_response("FYI"))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.rate_limiting.request_timeout_secs = Some(1);
    let client = HttpClassificationClient::from_config(&config).unwrap();
    assert_eq!(client.timeout(), Duration::from_secs(1));

    let error = assert_err!(client.classify("x").await);
    assert!(matches!(error, ClassifierError::Timeout { timeout_secs: 1 }));
    assert!(error.is_transient());
}

#[tokio::test]
async fn test_custom_headers_and_parameters() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("x-api-key", "sk-test"))
        .and(body_partial_json(json!({
            "model": "claude-test",
            "max_tokens": 10,
            "prompt": "Prompt: hello"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"output": "PROMO"})))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.api.model_name = "claude-test".to_string();
    config.api.headers.clear();
    config
        .api
        .headers
        .insert("x-api-key".to_string(), "{API_KEY}".to_string());
    config.api.parameters.clear();
    config
        .api
        .parameters
        .insert("model".to_string(), json!("{MODEL_NAME}"));
    config
        .api
        .parameters
        .insert("max_tokens".to_string(), json!(10));
    config
        .api
        .parameters
        .insert("prompt".to_string(), json!("Prompt: {PROMPT}"));

    let client = HttpClassificationClient::from_config(&config).unwrap();
    assert_eq!(client.classify("hello").await.unwrap(), "PROMO");
}

//! Integration tests for the chat-completions client
//!
//! Tests HTTP client behavior using wiremock for request/response mocking.

use serde_json::json;
use wiremock::{
    matchers::{body_partial_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

use decision_tree_builder::config::{LlmConfig, RequestConfig};
use decision_tree_builder::error::LlmError;
use decision_tree_builder::llm::{ChatModel, ChatRequest, OpenAiClient};

/// Create a test client pointing to mock server
fn create_test_client(base_url: &str, max_retries: u32) -> OpenAiClient {
    let config = LlmConfig {
        api_key: "test-api-key".to_string(),
        base_url: base_url.to_string(),
        model: "gpt-test".to_string(),
    };

    let request_config = RequestConfig {
        timeout_ms: 5000,
        max_retries,
        retry_delay_ms: 10,
    };

    OpenAiClient::new(&config, request_config).expect("Failed to create client")
}

fn create_test_request() -> ChatRequest {
    ChatRequest::question("gpt-test", "You are a mechanic.", "My car rattles.")
}

fn completion(content: &str) -> serde_json::Value {
    json!({
        "model": "gpt-test",
        "choices": [{
            "message": {"role": "assistant", "content": content, "refusal": null},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 40, "completion_tokens": 20, "total_tokens": 60}
    })
}

#[cfg(test)]
mod completion_tests {
    use super::*;

    #[tokio::test]
    async fn test_successful_completion() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer test-api-key"))
            .and(body_partial_json(json!({
                "model": "gpt-test",
                "messages": [
                    {"role": "system", "content": "You are a mechanic."},
                    {"role": "user", "content": "My car rattles."}
                ],
                "response_format": {
                    "type": "json_schema",
                    "json_schema": {"name": "question", "strict": true}
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("{\"question\":\"?\"}")))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 0);
        let content = client.complete(create_test_request()).await.unwrap();

        assert_eq!(content, "{\"question\":\"?\"}");
    }

    #[tokio::test]
    async fn test_retry_then_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("ok")))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 2);
        let content = client.complete(create_test_request()).await.unwrap();

        assert_eq!(content, "ok");
    }
}

#[cfg(test)]
mod error_tests {
    use super::*;

    #[tokio::test]
    async fn test_api_error_exhausts_retries() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
            .expect(2)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 1);
        let err = client.complete(create_test_request()).await.unwrap_err();

        match err {
            LlmError::Unavailable { message, retries } => {
                assert!(message.contains("500"));
                assert_eq!(retries, 2);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_refusal_is_not_retried() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{
                    "message": {"role": "assistant", "content": null, "refusal": "I can't help with that."}
                }]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 3);
        let err = client.complete(create_test_request()).await.unwrap_err();

        assert!(matches!(err, LlmError::Refused { .. }));
    }

    #[tokio::test]
    async fn test_empty_choices() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 0);
        let err = client.complete(create_test_request()).await.unwrap_err();

        match err {
            LlmError::Unavailable { message, .. } => assert!(message.contains("no choices")),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 0);
        let err = client.complete(create_test_request()).await.unwrap_err();

        match err {
            LlmError::Unavailable { message, .. } => {
                assert!(message.contains("Failed to parse response"))
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}

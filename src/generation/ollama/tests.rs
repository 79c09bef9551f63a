use super::*;
use serde_json::json;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn generator_for(server: &MockServer) -> OllamaGenerator {
    let uri = Url::parse(&server.uri()).expect("mock server uri should parse");
    let mut config = Config::default();
    config.ollama.host = uri.host_str().unwrap_or("127.0.0.1").to_string();
    config.ollama.port = uri.port().unwrap_or(80);
    config.generation.model = "test-chat".to_string();

    let client = OllamaClient::new(&config)
        .expect("Failed to create client")
        .with_retry_backoff(Duration::from_millis(10));
    OllamaGenerator::with_client(client, config.generation.model, 0.7)
}

#[tokio::test(flavor = "multi_thread")]
async fn sends_system_and_user_messages() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({
            "model": "test-chat",
            "stream": false,
            "messages": [
                {"role": "system", "content": "be brief"},
                {"role": "user", "content": "hi there"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "test-chat",
            "message": {"role": "assistant", "content": "  hello!  "},
            "done": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let generator = generator_for(&server);
    let answer = generator
        .generate("be brief", "hi there")
        .await
        .expect("should generate answer");

    assert_eq!(answer, "hello!");
    assert_eq!(generator.model(), "test-chat");
}

#[tokio::test(flavor = "multi_thread")]
async fn server_failure_is_upstream_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let result = generator_for(&server).generate("system", "prompt").await;
    assert!(matches!(result, Err(RagError::UpstreamUnavailable(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_answer_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": {"role": "assistant", "content": "   "}
        })))
        .mount(&server)
        .await;

    let result = generator_for(&server).generate("system", "prompt").await;
    assert!(matches!(result, Err(RagError::UpstreamUnavailable(_))));
}

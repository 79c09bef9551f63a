use super::*;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> Config {
    let uri = Url::parse(&server.uri()).expect("mock server uri should parse");
    let mut config = Config::default();
    config.ollama.host = uri.host_str().unwrap_or("127.0.0.1").to_string();
    config.ollama.port = uri.port().unwrap_or(80);
    config.embeddings.model = "test-embed".to_string();
    config.embeddings.dimension = 3;
    config.embeddings.batch_size = 2;
    config
}

fn fast_client(config: &Config) -> OllamaClient {
    OllamaClient::new(config)
        .expect("Failed to create client")
        .with_retry_backoff(Duration::from_millis(10))
}

#[test]
fn client_configuration() {
    let mut config = Config::default();
    config.ollama.host = "test-host".to_string();
    config.ollama.port = 1234;
    config.embeddings.model = "test-model".to_string();
    config.embeddings.batch_size = 128;

    let client = OllamaClient::new(&config).expect("Failed to create client");

    assert_eq!(client.model, "test-model");
    assert_eq!(client.batch_size, 128);
    assert_eq!(client.dimension, 768);
    assert_eq!(client.base_url.host_str(), Some("test-host"));
    assert_eq!(client.base_url.port(), Some(1234));
    assert_eq!(client.retry_attempts, DEFAULT_RETRY_ATTEMPTS);
}

#[test]
fn client_builder_methods() {
    let client = OllamaClient::new(&Config::default())
        .expect("Failed to create client")
        .with_timeout(Duration::from_secs(60))
        .with_retry_attempts(5)
        .with_retry_backoff(Duration::from_millis(5));

    assert_eq!(client.retry_attempts, 5);
    assert_eq!(client.retry_backoff, Duration::from_millis(5));
}

#[tokio::test(flavor = "multi_thread")]
async fn embed_batches_requests_and_preserves_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({"model": "test-embed", "input": ["a", "b"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({"input": ["c"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[0.0, 0.0, 1.0]]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = fast_client(&config_for(&server));
    let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    let vectors = client.embed(&texts).await.expect("should embed texts");

    assert_eq!(
        vectors,
        vec![
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.0, 0.0, 1.0]
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn server_errors_are_retried_then_reported_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let client = fast_client(&config_for(&server));
    let result = client.embed(&["hello".to_string()]).await;

    assert!(matches!(result, Err(RagError::EmbeddingUnavailable(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": "model not found"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = fast_client(&config_for(&server));
    let result = client.embed(&["hello".to_string()]).await;

    match result {
        Err(RagError::EmbeddingUnavailable(message)) => assert!(message.contains("404")),
        other => panic!("expected EmbeddingUnavailable, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn wrong_dimension_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[1.0, 0.0]]
        })))
        .mount(&server)
        .await;

    let client = fast_client(&config_for(&server));
    let result = client.embed(&["hello".to_string()]).await;

    assert!(matches!(result, Err(RagError::EmbeddingUnavailable(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_server_is_unavailable() {
    let mut config = Config::default();
    config.ollama.host = "127.0.0.1".to_string();
    config.ollama.port = 9;
    let client = OllamaClient::new(&config)
        .expect("Failed to create client")
        .with_retry_attempts(1);

    let result = client.embed(&["hello".to_string()]).await;
    assert!(matches!(result, Err(RagError::EmbeddingUnavailable(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn health_check_verifies_model() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{"name": "test-embed", "size": 1, "digest": "abc"}]
        })))
        .mount(&server)
        .await;

    let client = fast_client(&config_for(&server));
    let result = tokio::task::spawn_blocking(move || client.health_check())
        .await
        .expect("health check task should finish");
    assert!(result.is_ok(), "health check failed: {:?}", result.err());

    let mut other = config_for(&server);
    other.embeddings.model = "missing-model".to_string();
    let client = fast_client(&other);
    let result = tokio::task::spawn_blocking(move || client.health_check())
        .await
        .expect("health check task should finish");
    assert!(result.is_err());
}

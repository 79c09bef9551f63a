//! Shared harness for HTTP-level tests.
//!
//! Runs the full router against a hashing embedder, a canned generator and
//! real LanceDB and SQLite stores in a temporary directory, with a live worker pool.

#![allow(dead_code, reason = "each test binary uses a subset of the harness")]

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chat_rag::Result;
use chat_rag::config::QueueConfig;
use chat_rag::database::Database;
use chat_rag::database::lancedb::VectorStore;
use chat_rag::embeddings::{ChunkingConfig, HashingEmbedder};
use chat_rag::generation::Generator;
use chat_rag::ingestion::{BlobFetcher, CallbackClient, IngestionPipeline};
use chat_rag::server::{AppState, build_router};
use chat_rag::tasks::{PipelineExecutor, TaskExecutor, TaskQueue, WorkerPool};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::sync::watch;
use tower::ServiceExt;

/// Answers every prompt with a fixed sentence
#[derive(Debug)]
pub struct CannedGenerator;

#[async_trait]
impl Generator for CannedGenerator {
    async fn generate(&self, _system: &str, _prompt: &str) -> Result<String> {
        Ok("Sounds good, see you at standup.".to_string())
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    shutdown: watch::Sender<bool>,
    workers: WorkerPool,
    _temp_dir: TempDir,
}

impl TestApp {
    pub async fn start() -> Self {
        let temp_dir = TempDir::new().expect("should create temp dir");
        let store = VectorStore::open(
            &temp_dir.path().join("vectors"),
            Arc::new(HashingEmbedder::new(64)),
        )
        .await
        .expect("should open vector store");
        let database = Database::initialize_from_config_dir(temp_dir.path())
            .await
            .expect("should open task database");
        let queue = TaskQueue::new(
            database,
            &QueueConfig {
                retry_delay_seconds: 0,
                poll_interval_ms: 10,
                ..QueueConfig::default()
            },
        );

        let pipeline = IngestionPipeline::new(
            store.clone(),
            BlobFetcher::with_limits(Duration::from_secs(5), 1024 * 1024),
            ChunkingConfig::default(),
        );
        let executor: Arc<dyn TaskExecutor> = Arc::new(PipelineExecutor::new(
            pipeline,
            CallbackClient::with_timeout(Duration::from_secs(5)),
        ));

        let (shutdown, shutdown_rx) = watch::channel(false);
        let workers = WorkerPool::spawn(2, &queue, &executor, &shutdown_rx);

        let state = AppState::new(
            store,
            queue,
            Arc::new(CannedGenerator),
            Duration::from_secs(20),
        );
        let router = build_router(state.clone(), Duration::from_secs(30));

        Self {
            router,
            state,
            shutdown,
            workers,
            _temp_dir: temp_dir,
        }
    }

    pub async fn post(&self, path: &str, body: &Value) -> (StatusCode, Value) {
        let request = Request::post(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("should build request");
        self.send(request).await
    }

    pub async fn post_raw(&self, path: &str, body: &'static str) -> (StatusCode, Value) {
        let request = Request::post(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .expect("should build request");
        self.send(request).await
    }

    pub async fn get(&self, path: &str) -> (StatusCode, Value) {
        let request = Request::get(path)
            .body(Body::empty())
            .expect("should build request");
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router should respond");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("should read body")
            .to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("response should be JSON")
        };
        (status, body)
    }

    /// Post a message event and wait until the workers have indexed it
    pub async fn ingest_message(&self, event: &Value) {
        let (status, body) = self.post("/message-event", event).await;
        assert_eq!(status, StatusCode::OK, "unexpected response {}", body);
        self.wait_for_idle_queue().await;
    }

    pub async fn wait_for_idle_queue(&self) {
        let deadline = Instant::now() + Duration::from_secs(20);
        loop {
            let stats = self.state.queue.stats().await.expect("should read stats");
            if stats.pending == 0 && stats.processing == 0 {
                return;
            }
            assert!(Instant::now() < deadline, "queue did not drain: {:?}", stats);
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    pub async fn stop(self) {
        self.shutdown.send(true).expect("workers should be listening");
        self.workers.join().await;
    }
}

pub fn message_event(id: &str, workspace_id: &str, user_id: &str, content: &str) -> Value {
    serde_json::json!({
        "id": id,
        "content": content,
        "workspaceId": workspace_id,
        "userId": user_id,
        "channelId": "c1",
        "userName": "alice",
        "channelName": "general",
        "createdAt": "2024-03-01T12:00:00Z"
    })
}

pub fn message_ids(body: &Value, field: &str) -> Vec<String> {
    body[field]
        .as_array()
        .expect("response should list records")
        .iter()
        .filter_map(|m| m["messageId"].as_str().map(str::to_string))
        .collect()
}

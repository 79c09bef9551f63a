//! HTTP server
//!
//! Builds the axum router over the shared [`AppState`], starts the background
//! worker pool and serves until Ctrl+C or SIGTERM. Shutdown drains in-flight
//! requests first, then stops the workers.


pub mod error;
pub mod routes;
pub mod state;

use anyhow::{Context, Result};
use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::Config;
use crate::database::Database;
use crate::database::lancedb::VectorStore;
use crate::embeddings::create_embedder;
use crate::generation::create_generator;
use crate::ingestion::{BlobFetcher, CallbackClient, IngestionPipeline};
use crate::tasks::{PipelineExecutor, TaskExecutor, TaskQueue, WorkerPool};

pub use error::{ApiError, ApiResult};
pub use state::AppState;

/// Build the router with every endpoint and the tracing and timeout layers
#[inline]
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/message-event", post(routes::messages::message_event))
        .route("/search", post(routes::search::search))
        .route("/generate", post(routes::search::generate))
        .route(
            "/knowledge-base/generate",
            post(routes::search::knowledge_base_generate),
        )
        .route(
            "/process-document",
            post(routes::documents::process_document),
        )
        .route("/delete-document", post(routes::documents::delete_document))
        .route("/delete-vectors", post(routes::vectors::delete_vectors))
        .fallback(routes::not_found)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Everything `serve` needs, wired from the configuration
#[derive(Debug)]
pub struct Application {
    pub state: AppState,
    pub executor: Arc<dyn TaskExecutor>,
}

impl Application {
    #[inline]
    pub async fn from_config(config: &Config) -> Result<Self> {
        let embedder = create_embedder(config)?;
        let store = VectorStore::new(config, embedder)
            .await
            .context("Failed to open vector store")?;
        let database = Database::initialize_from_config_dir(config.get_base_dir())
            .await
            .context("Failed to open task database")?;
        let queue = TaskQueue::new(database, &config.queue);
        let generator = create_generator(config)?;

        let pipeline = IngestionPipeline::new(
            store.clone(),
            BlobFetcher::new(&config.documents),
            config.chunking.clone(),
        );
        let executor: Arc<dyn TaskExecutor> =
            Arc::new(PipelineExecutor::new(pipeline, CallbackClient::default()));

        Ok(Self {
            state: AppState::new(store, queue, generator, config.queue.await_timeout()),
            executor,
        })
    }
}

/// Run the HTTP server and worker pool until a shutdown signal arrives
#[inline]
pub async fn serve(config: &Config) -> Result<()> {
    let addr = config.server.bind_address()?;
    let app = Application::from_config(config).await?;

    let requeued = app.state.queue.reset_stuck().await?;
    if requeued > 0 {
        info!("Requeued {} tasks interrupted by the last shutdown", requeued);
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let workers = WorkerPool::spawn(
        config.queue.workers,
        &app.state.queue,
        &app.executor,
        &shutdown_rx,
    );

    let router = build_router(app.state, config.server.request_timeout());
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);

    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed");

    info!("Stopping queue workers");
    if shutdown_tx.send(true).is_err() {
        error!("Queue workers were already gone at shutdown");
    }
    workers.join().await;

    served?;
    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}

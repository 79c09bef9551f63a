use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Embedding service unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("Upstream service unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Tenant violation: {0}")]
    TenantViolation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl RagError {
    /// Whether a background task failing with this error may succeed on a later attempt.
    ///
    /// Malformed input, missing sources and cross-workspace operations will fail the
    /// same way every time, so the task queue marks them failed immediately.
    #[inline]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::EmbeddingUnavailable(_)
            | Self::UpstreamUnavailable(_)
            | Self::Database(_)
            | Self::Io(_)
            | Self::Other(_) => true,
            Self::Validation(_)
            | Self::NotFound(_)
            | Self::TenantViolation(_)
            | Self::Config(_)
            | Self::Queue(_) => false,
        }
    }
}

pub mod commands;
pub mod config;
pub mod database;
pub mod embeddings;
pub mod generation;
pub mod ingestion;
pub mod retrieval;
pub mod server;
pub mod tasks;

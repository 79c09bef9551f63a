//! HTTP error responses
//!
//! Every failed request that is not answered with an endpoint-specific failure
//! body is rendered as `{"error": {"code", "message"}}` with a status derived
//! from the [`RagError`] classification.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::RagError;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// A [`RagError`] on its way out of an HTTP handler
#[derive(Debug)]
pub struct ApiError(pub RagError);

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// Status code for a classified failure
#[inline]
pub fn status_for(error: &RagError) -> StatusCode {
    match error {
        RagError::Validation(_) => StatusCode::BAD_REQUEST,
        RagError::NotFound(_) => StatusCode::NOT_FOUND,
        RagError::TenantViolation(_) => StatusCode::FORBIDDEN,
        RagError::EmbeddingUnavailable(_)
        | RagError::UpstreamUnavailable(_)
        | RagError::Config(_)
        | RagError::Database(_)
        | RagError::Queue(_)
        | RagError::Io(_)
        | RagError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ApiError {
    #[inline]
    pub fn status_code(&self) -> StatusCode {
        status_for(&self.0)
    }

    fn error_code(&self) -> &'static str {
        match self.0 {
            RagError::Validation(_) => "VALIDATION_ERROR",
            RagError::EmbeddingUnavailable(_) => "EMBEDDING_UNAVAILABLE",
            RagError::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            RagError::NotFound(_) => "NOT_FOUND",
            RagError::TenantViolation(_) => "TENANT_VIOLATION",
            RagError::Config(_) => "CONFIG_ERROR",
            RagError::Database(_) => "DATABASE_ERROR",
            RagError::Queue(_) => "QUEUE_ERROR",
            RagError::Io(_) | RagError::Other(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<RagError> for ApiError {
    #[inline]
    fn from(error: RagError) -> Self {
        Self(error)
    }
}

impl From<JsonRejection> for ApiError {
    #[inline]
    fn from(rejection: JsonRejection) -> Self {
        Self(RagError::Validation(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            warn!("Request rejected: {}", self.0);
        }

        let body = ErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.0.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::RagError;
use crate::database::lancedb::DeleteCriteria;
use crate::server::error::status_for;
use crate::server::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteVectorsRequest {
    pub vector_ids: Vec<String>,
    pub workspace_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteVectorsResponse {
    pub success: bool,
    pub deleted_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Delete records by identifier within the caller's workspace.
///
/// Identifiers owned by another workspace reject the whole request.
#[inline]
pub async fn delete_vectors(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DeleteVectorsRequest>, JsonRejection>,
) -> (StatusCode, Json<DeleteVectorsResponse>) {
    let result = match payload {
        Ok(Json(request)) => {
            state
                .store
                .delete(
                    &request.workspace_id,
                    DeleteCriteria::Ids(request.vector_ids),
                )
                .await
        }
        Err(rejection) => Err(RagError::Validation(rejection.body_text())),
    };

    match result {
        Ok(deleted_count) => {
            info!("Deleted {} vectors", deleted_count);
            (
                StatusCode::OK,
                Json(DeleteVectorsResponse {
                    success: true,
                    deleted_count,
                    error: None,
                }),
            )
        }
        Err(e) => {
            warn!("Vector deletion rejected: {}", e);
            (
                status_for(&e),
                Json(DeleteVectorsResponse {
                    success: false,
                    deleted_count: 0,
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::database::sqlite::models::TaskStats;
use crate::server::error::ApiResult;
use crate::server::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub records: u64,
    pub queue: TaskStats,
}

/// Liveness check with index and queue counts
#[inline]
pub async fn health_check(State(state): State<Arc<AppState>>) -> ApiResult<Json<HealthResponse>> {
    let records = state.store.count(None).await?;
    let queue = state.queue.stats().await?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        records,
        queue,
    }))
}

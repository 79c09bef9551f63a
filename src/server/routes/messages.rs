use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::ingestion::MessageEvent;
use crate::server::error::ApiResult;
use crate::server::state::AppState;
use crate::tasks::TaskPayload;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageQueuedResponse {
    pub status: String,
    pub message_id: String,
}

/// Queue one chat message for ingestion
#[inline]
pub async fn message_event(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<MessageEvent>, JsonRejection>,
) -> ApiResult<Json<MessageQueuedResponse>> {
    let Json(event) = payload?;
    event.validate()?;

    let message_id = event.id.clone();
    let task_id = state
        .queue
        .enqueue(TaskPayload::IngestMessage(event))
        .await?;
    info!("Queued message {} as task {}", message_id, task_id);

    Ok(Json(MessageQueuedResponse {
        status: "queued".to_string(),
        message_id,
    }))
}

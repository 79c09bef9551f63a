//! Document endpoints
//!
//! Both endpoints enqueue a task and wait for its outcome, so request latency
//! follows worker throughput. They always answer 200 and report failures in
//! the body with `success: false`.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::ingestion::{ContentKind, DeleteDocumentJob, DocumentJob};
use crate::server::state::AppState;
use crate::tasks::{TaskOutcome, TaskOutput, TaskPayload};

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessDocumentResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunks: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteDocumentResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Output of a completed task, or the reason it did not complete
fn task_result(outcome: crate::Result<TaskOutcome>) -> Result<TaskOutput, String> {
    match outcome {
        Ok(TaskOutcome::Completed(output)) => Ok(output),
        Ok(TaskOutcome::Failed { error, attempts }) => {
            warn!("Document task failed after {} attempt(s)", attempts);
            Err(error)
        }
        Err(e) => Err(e.to_string()),
    }
}

/// Fetch, chunk and index a document, waiting for the result
#[inline]
pub async fn process_document(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DocumentJob>, JsonRejection>,
) -> Json<ProcessDocumentResponse> {
    let job = match payload {
        Ok(Json(job)) => job,
        Err(rejection) => {
            return Json(ProcessDocumentResponse {
                error: Some(rejection.body_text()),
                ..ProcessDocumentResponse::default()
            });
        }
    };
    let document_id = job.document_id.clone();

    let checked = job
        .validate()
        .and_then(|()| ContentKind::detect(&job.file_type, &job.file_name).map(|_| ()));
    let outcome = match checked {
        Ok(()) => {
            state
                .queue
                .submit_and_await(TaskPayload::IngestDocument(job), state.await_timeout)
                .await
        }
        Err(e) => Err(e),
    };

    match task_result(outcome) {
        Ok(TaskOutput::DocumentIngested(outcome)) => {
            info!(
                "Processed document {} into {} chunks",
                outcome.document_id, outcome.chunks
            );
            Json(ProcessDocumentResponse {
                success: true,
                document_id: Some(outcome.document_id),
                chunks: Some(outcome.chunks),
                vector_ids: Some(outcome.vector_ids),
                error: None,
            })
        }
        Ok(other) => Json(ProcessDocumentResponse {
            document_id: Some(document_id),
            error: Some(format!("unexpected task result {:?}", other)),
            ..ProcessDocumentResponse::default()
        }),
        Err(error) => {
            warn!("Processing document {} failed: {}", document_id, error);
            Json(ProcessDocumentResponse {
                document_id: Some(document_id),
                error: Some(error),
                ..ProcessDocumentResponse::default()
            })
        }
    }
}

/// Remove every chunk of a document, waiting for the result
#[inline]
pub async fn delete_document(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DeleteDocumentJob>, JsonRejection>,
) -> Json<DeleteDocumentResponse> {
    let job = match payload {
        Ok(Json(job)) => job,
        Err(rejection) => {
            return Json(DeleteDocumentResponse {
                error: Some(rejection.body_text()),
                ..DeleteDocumentResponse::default()
            });
        }
    };
    let document_id = job.document_id.clone();

    let outcome = match job.validate() {
        Ok(()) => {
            state
                .queue
                .submit_and_await(TaskPayload::DeleteDocument(job), state.await_timeout)
                .await
        }
        Err(e) => Err(e),
    };

    match task_result(outcome) {
        Ok(TaskOutput::DocumentDeleted {
            document_id,
            deleted_count,
        }) => Json(DeleteDocumentResponse {
            success: true,
            document_id: Some(document_id),
            deleted_count: Some(deleted_count),
            error: None,
        }),
        Ok(other) => Json(DeleteDocumentResponse {
            document_id: Some(document_id),
            error: Some(format!("unexpected task result {:?}", other)),
            ..DeleteDocumentResponse::default()
        }),
        Err(error) => {
            warn!("Deleting document {} failed: {}", document_id, error);
            Json(DeleteDocumentResponse {
                document_id: Some(document_id),
                error: Some(error),
                ..DeleteDocumentResponse::default()
            })
        }
    }
}

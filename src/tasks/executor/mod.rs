
use async_trait::async_trait;
use tracing::debug;

use crate::Result;
use crate::ingestion::{CallbackClient, DocumentCallback, DocumentStatus, IngestionPipeline};
use crate::tasks::{TaskExecutor, TaskOutput, TaskPayload};

/// Executes queued work against the ingestion pipeline
#[derive(Debug, Clone)]
pub struct PipelineExecutor {
    pipeline: IngestionPipeline,
    callbacks: CallbackClient,
}

impl PipelineExecutor {
    #[inline]
    pub fn new(pipeline: IngestionPipeline, callbacks: CallbackClient) -> Self {
        Self {
            pipeline,
            callbacks,
        }
    }
}

#[async_trait]
impl TaskExecutor for PipelineExecutor {
    async fn execute(&self, payload: &TaskPayload) -> Result<TaskOutput> {
        match payload {
            TaskPayload::IngestMessage(event) => {
                let vector_id = self.pipeline.ingest_message(event).await?;
                Ok(TaskOutput::MessageIngested {
                    message_id: event.id.clone(),
                    vector_id,
                })
            }
            TaskPayload::IngestDocument(job) => {
                let outcome = self.pipeline.ingest_document(job).await?;
                Ok(TaskOutput::DocumentIngested(outcome))
            }
            TaskPayload::DeleteDocument(job) => {
                job.validate()?;
                let deleted_count = self
                    .pipeline
                    .delete_document(&job.workspace_id, &job.document_id)
                    .await?;

                if let Some(target) = job.callback_target() {
                    let body = DocumentCallback {
                        document_id: job.document_id.clone(),
                        status: DocumentStatus::Deleted,
                        error: None,
                    };
                    self.callbacks.notify(&target, body).await;
                }

                Ok(TaskOutput::DocumentDeleted {
                    document_id: job.document_id.clone(),
                    deleted_count,
                })
            }
        }
    }

    async fn on_failed(&self, payload: &TaskPayload, error: &str) {
        let TaskPayload::DeleteDocument(job) = payload else {
            return;
        };
        let Some(target) = job.callback_target() else {
            return;
        };

        debug!("Reporting failed deletion of document {}", job.document_id);
        let body = DocumentCallback {
            document_id: job.document_id.clone(),
            status: DocumentStatus::Failed,
            error: Some(error.to_string()),
        };
        self.callbacks.notify(&target, body).await;
    }
}

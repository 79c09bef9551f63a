// Task queue module
// Durable background work with bounded retries and submit-and-await


pub mod executor;
pub mod worker;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use crate::config::QueueConfig;
use crate::database::Database;
use crate::database::sqlite::models::{NewTask, Task, TaskKind, TaskStats, TaskStatus};
use crate::ingestion::{DeleteDocumentJob, DocumentJob, DocumentOutcome, MessageEvent};
use crate::{RagError, Result};

pub use executor::PipelineExecutor;
pub use worker::WorkerPool;

/// Work a background worker can perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskPayload {
    IngestMessage(MessageEvent),
    IngestDocument(DocumentJob),
    DeleteDocument(DeleteDocumentJob),
}

impl TaskPayload {
    #[inline]
    pub fn kind(&self) -> TaskKind {
        match self {
            Self::IngestMessage(_) => TaskKind::IngestMessage,
            Self::IngestDocument(_) => TaskKind::IngestDocument,
            Self::DeleteDocument(_) => TaskKind::DeleteDocument,
        }
    }

    #[inline]
    pub fn to_json(&self) -> Result<String> {
        let json = match self {
            Self::IngestMessage(event) => serde_json::to_string(event),
            Self::IngestDocument(job) => serde_json::to_string(job),
            Self::DeleteDocument(job) => serde_json::to_string(job),
        };
        json.map_err(|e| RagError::Queue(format!("Failed to encode task payload: {}", e)))
    }

    #[inline]
    pub fn from_json(kind: TaskKind, json: &str) -> Result<Self> {
        let payload = match kind {
            TaskKind::IngestMessage => serde_json::from_str(json).map(Self::IngestMessage),
            TaskKind::IngestDocument => serde_json::from_str(json).map(Self::IngestDocument),
            TaskKind::DeleteDocument => serde_json::from_str(json).map(Self::DeleteDocument),
        };
        payload.map_err(|e| RagError::Queue(format!("Failed to decode {} payload: {}", kind, e)))
    }
}

/// What a completed task produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskOutput {
    MessageIngested {
        message_id: String,
        vector_id: String,
    },
    DocumentIngested(DocumentOutcome),
    DocumentDeleted {
        document_id: String,
        deleted_count: u64,
    },
}

/// Final state of an awaited task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed(TaskOutput),
    Failed { error: String, attempts: u32 },
}

/// A task claimed by a worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedTask {
    pub id: String,
    pub attempt: u32,
    pub max_attempts: u32,
    pub payload: TaskPayload,
}

/// Runs task payloads on behalf of the worker pool
#[async_trait]
pub trait TaskExecutor: Send + Sync + std::fmt::Debug {
    async fn execute(&self, payload: &TaskPayload) -> Result<TaskOutput>;

    /// Called once after a task has failed for good
    async fn on_failed(&self, _payload: &TaskPayload, _error: &str) {}
}

fn database_error(error: &anyhow::Error) -> RagError {
    RagError::Database(format!("{:#}", error))
}

/// Durable FIFO of background tasks stored in SQLite.
///
/// Delivery is at least once: tasks interrupted by a restart are handed out again
/// by [`TaskQueue::reset_stuck`]. Failed attempts are retried after a fixed delay
/// until `max_attempts` is reached, after which the task stays failed.
#[derive(Debug, Clone)]
pub struct TaskQueue {
    database: Database,
    max_attempts: u32,
    retry_delay: Duration,
    poll_interval: Duration,
    notify: Arc<Notify>,
}

impl TaskQueue {
    #[inline]
    pub fn new(database: Database, config: &QueueConfig) -> Self {
        Self {
            database,
            max_attempts: config.max_attempts.max(1),
            retry_delay: config.retry_delay(),
            poll_interval: config.poll_interval(),
            notify: Arc::new(Notify::new()),
        }
    }

    #[inline]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Resolves when a task is enqueued
    #[inline]
    pub async fn notified(&self) {
        self.notify.notified().await;
    }

    #[inline]
    pub async fn enqueue(&self, payload: TaskPayload) -> Result<String> {
        let task = self
            .database
            .insert_task(NewTask {
                kind: payload.kind(),
                payload: payload.to_json()?,
                max_attempts: i64::from(self.max_attempts),
            })
            .await
            .map_err(|e| database_error(&e))?;

        debug!("Enqueued {} task {}", task.kind, task.id);
        self.notify.notify_waiters();
        Ok(task.id)
    }

    #[inline]
    pub async fn get(&self, id: &str) -> Result<Option<Task>> {
        self.database
            .get_task(id)
            .await
            .map_err(|e| database_error(&e))
    }

    /// Take the next due task, if any
    #[inline]
    pub async fn claim_next(&self) -> Result<Option<ClaimedTask>> {
        loop {
            let Some(task) = self
                .database
                .claim_next_task(Utc::now().naive_utc())
                .await
                .map_err(|e| database_error(&e))?
            else {
                return Ok(None);
            };

            match TaskPayload::from_json(task.kind, &task.payload) {
                Ok(payload) => {
                    return Ok(Some(ClaimedTask {
                        id: task.id,
                        attempt: u32::try_from(task.attempts).unwrap_or(u32::MAX),
                        max_attempts: u32::try_from(task.max_attempts).unwrap_or(u32::MAX),
                        payload,
                    }));
                }
                Err(e) => {
                    error!("Discarding task {}: {}", task.id, e);
                    self.database
                        .fail_task(&task.id, &e.to_string())
                        .await
                        .map_err(|e| database_error(&e))?;
                }
            }
        }
    }

    #[inline]
    pub async fn complete(&self, id: &str, output: &TaskOutput) -> Result<()> {
        let json = serde_json::to_string(output)
            .map_err(|e| RagError::Queue(format!("Failed to encode task result: {}", e)))?;
        let updated = self
            .database
            .complete_task(id, &json)
            .await
            .map_err(|e| database_error(&e))?;
        if !updated {
            warn!("Task {} was not processing when completed", id);
        }
        Ok(())
    }

    /// Record a failed attempt. Returns the resulting status: `Pending` when the task
    /// will be retried after the fixed delay, `Failed` when it is given up.
    #[inline]
    pub async fn fail(&self, id: &str, error: &str, retryable: bool) -> Result<TaskStatus> {
        let task = self
            .get(id)
            .await?
            .ok_or_else(|| RagError::Queue(format!("Task {} not found", id)))?;

        if retryable && task.has_attempts_left() {
            let delay = chrono::Duration::from_std(self.retry_delay)
                .map_err(|e| RagError::Queue(format!("Invalid retry delay: {}", e)))?;
            let available_at = Utc::now().naive_utc() + delay;
            self.database
                .reschedule_task(id, error, available_at)
                .await
                .map_err(|e| database_error(&e))?;
            warn!(
                "Task {} attempt {}/{} failed, retrying in {:?}: {}",
                id, task.attempts, task.max_attempts, self.retry_delay, error
            );
            Ok(TaskStatus::Pending)
        } else {
            self.database
                .fail_task(id, error)
                .await
                .map_err(|e| database_error(&e))?;
            error!(
                "Task {} failed after {} attempt(s): {}",
                id, task.attempts, error
            );
            Ok(TaskStatus::Failed)
        }
    }

    /// Return tasks interrupted mid-processing to the queue
    #[inline]
    pub async fn reset_stuck(&self) -> Result<u64> {
        let (requeued, _failed) = self
            .database
            .reset_processing_tasks()
            .await
            .map_err(|e| database_error(&e))?;
        Ok(requeued)
    }

    #[inline]
    pub async fn stats(&self) -> Result<TaskStats> {
        self.database
            .task_stats()
            .await
            .map_err(|e| database_error(&e))
    }

    /// Delete finished tasks older than `age`
    #[inline]
    pub async fn cleanup_finished(&self, age: Duration) -> Result<u64> {
        let age = chrono::Duration::from_std(age)
            .map_err(|e| RagError::Queue(format!("Invalid cleanup age: {}", e)))?;
        let deleted = self
            .database
            .delete_finished_tasks_before(Utc::now().naive_utc() - age)
            .await
            .map_err(|e| database_error(&e))?;
        info!("Removed {} finished tasks", deleted);
        Ok(deleted)
    }

    /// Wait until task `id` completes or fails for good.
    ///
    /// Gives up with [`RagError::UpstreamUnavailable`] after `timeout`; the task itself
    /// keeps running in the background.
    #[inline]
    pub async fn await_result(&self, id: &str, timeout: Duration) -> Result<TaskOutcome> {
        tokio::time::timeout(timeout, self.poll_until_finished(id)).await.map_err(|_| {
            warn!("Timed out after {:?} waiting for task {}", timeout, id);
            RagError::UpstreamUnavailable(format!(
                "timed out after {}s waiting for background task {}",
                timeout.as_secs(),
                id
            ))
        })?
    }

    async fn poll_until_finished(&self, id: &str) -> Result<TaskOutcome> {
        loop {
            let task = self
                .get(id)
                .await?
                .ok_or_else(|| RagError::NotFound(format!("Task {} not found", id)))?;

            match task.status {
                TaskStatus::Completed => {
                    let json = task.result.as_deref().unwrap_or("null");
                    let output = serde_json::from_str(json).map_err(|e| {
                        RagError::Queue(format!("Failed to decode task result: {}", e))
                    })?;
                    return Ok(TaskOutcome::Completed(output));
                }
                TaskStatus::Failed => {
                    return Ok(TaskOutcome::Failed {
                        error: task
                            .last_error
                            .unwrap_or_else(|| "task failed".to_string()),
                        attempts: u32::try_from(task.attempts).unwrap_or(u32::MAX),
                    });
                }
                TaskStatus::Pending | TaskStatus::Processing => {
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    /// Enqueue a task and wait for its final outcome
    #[inline]
    pub async fn submit_and_await(
        &self,
        payload: TaskPayload,
        timeout: Duration,
    ) -> Result<TaskOutcome> {
        let id = self.enqueue(payload).await?;
        self.await_result(&id, timeout).await
    }
}

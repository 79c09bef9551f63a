
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};

/// A row of the durable task queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: String,
    pub kind: TaskKind,
    /// JSON-encoded task payload
    pub payload: String,
    pub status: TaskStatus,
    pub attempts: i64,
    pub max_attempts: i64,
    pub last_error: Option<String>,
    /// JSON-encoded outcome, set once the task completes
    pub result: Option<String>,
    pub available_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Task {
    #[inline]
    pub fn has_attempts_left(&self) -> bool {
        self.attempts < self.max_attempts
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
pub enum TaskKind {
    IngestMessage,
    IngestDocument,
    DeleteDocument,
}

impl std::fmt::Display for TaskKind {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            TaskKind::IngestMessage => write!(f, "ingest_message"),
            TaskKind::IngestDocument => write!(f, "ingest_document"),
            TaskKind::DeleteDocument => write!(f, "delete_document"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub kind: TaskKind,
    pub payload: String,
    pub max_attempts: i64,
}

/// Number of tasks in each state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaskStats {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
}

impl TaskStats {
    #[inline]
    pub fn total(&self) -> u64 {
        self.pending + self.processing + self.completed + self.failed
    }
}

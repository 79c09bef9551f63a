
use super::models::*;
use anyhow::{Context, Result};
use chrono::{NaiveDateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::{debug, warn};

const TASK_COLUMNS: &str = "id, kind, payload, status, attempts, max_attempts, last_error, \
                            result, available_at, created_at, updated_at";

pub struct TaskQueries;

impl TaskQueries {
    #[inline]
    pub async fn create(pool: &SqlitePool, new_task: NewTask) -> Result<Task> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO tasks (id, kind, payload, status, attempts, max_attempts,
                               available_at, created_at, updated_at)
            VALUES (?, ?, ?, 'pending', 0, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(new_task.kind)
        .bind(&new_task.payload)
        .bind(new_task.max_attempts)
        .bind(now)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to insert task")?;

        Self::get_by_id(pool, &id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve created task"))
    }

    #[inline]
    pub async fn get_by_id(pool: &SqlitePool, id: &str) -> Result<Option<Task>> {
        let query = format!("SELECT {} FROM tasks WHERE id = ?", TASK_COLUMNS);
        sqlx::query_as::<_, Task>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("Failed to get task by id")
    }

    /// Move the oldest due pending task to `processing` and count the attempt.
    ///
    /// Runs as a single statement so two workers never claim the same task.
    #[inline]
    pub async fn claim_next(pool: &SqlitePool, now: NaiveDateTime) -> Result<Option<Task>> {
        let query = format!(
            r#"
            UPDATE tasks
            SET status = 'processing', attempts = attempts + 1, updated_at = ?
            WHERE id = (
                SELECT id FROM tasks
                WHERE status = 'pending' AND available_at <= ?
                ORDER BY available_at ASC, created_at ASC
                LIMIT 1
            )
            RETURNING {}
            "#,
            TASK_COLUMNS
        );

        let task = sqlx::query_as::<_, Task>(&query)
            .bind(now)
            .bind(now)
            .fetch_optional(pool)
            .await
            .context("Failed to claim next task")?;

        if let Some(task) = &task {
            debug!(
                "Claimed task {} ({}) attempt {}/{}",
                task.id, task.kind, task.attempts, task.max_attempts
            );
        }
        Ok(task)
    }

    #[inline]
    pub async fn mark_completed(pool: &SqlitePool, id: &str, result: &str) -> Result<bool> {
        let affected = sqlx::query(
            r#"
            UPDATE tasks
            SET status = 'completed', result = ?, last_error = NULL, updated_at = ?
            WHERE id = ? AND status = 'processing'
            "#,
        )
        .bind(result)
        .bind(Utc::now().naive_utc())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to mark task completed")?
        .rows_affected();

        Ok(affected > 0)
    }

    /// Return a processing task to the queue, due again at `available_at`
    #[inline]
    pub async fn reschedule(
        pool: &SqlitePool,
        id: &str,
        error: &str,
        available_at: NaiveDateTime,
    ) -> Result<bool> {
        let affected = sqlx::query(
            r#"
            UPDATE tasks
            SET status = 'pending', last_error = ?, available_at = ?, updated_at = ?
            WHERE id = ? AND status = 'processing'
            "#,
        )
        .bind(error)
        .bind(available_at)
        .bind(Utc::now().naive_utc())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to reschedule task")?
        .rows_affected();

        Ok(affected > 0)
    }

    #[inline]
    pub async fn mark_failed(pool: &SqlitePool, id: &str, error: &str) -> Result<bool> {
        let affected = sqlx::query(
            r#"
            UPDATE tasks
            SET status = 'failed', last_error = ?, updated_at = ?
            WHERE id = ? AND status = 'processing'
            "#,
        )
        .bind(error)
        .bind(Utc::now().naive_utc())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to mark task failed")?
        .rows_affected();

        Ok(affected > 0)
    }

    /// Recover tasks left in `processing` by a previous process.
    ///
    /// Tasks with attempts left go back to pending; the rest are failed so they are
    /// not retried beyond their budget. Returns (requeued, failed).
    #[inline]
    pub async fn reset_processing(pool: &SqlitePool) -> Result<(u64, u64)> {
        let now = Utc::now().naive_utc();
        let mut transaction = pool
            .begin()
            .await
            .context("Failed to begin transaction for task recovery")?;

        let failed = sqlx::query(
            r#"
            UPDATE tasks
            SET status = 'failed',
                last_error = COALESCE(last_error, 'interrupted while processing'),
                updated_at = ?
            WHERE status = 'processing' AND attempts >= max_attempts
            "#,
        )
        .bind(now)
        .execute(&mut *transaction)
        .await
        .context("Failed to fail exhausted tasks")?
        .rows_affected();

        let requeued = sqlx::query(
            r#"
            UPDATE tasks
            SET status = 'pending', available_at = ?, updated_at = ?
            WHERE status = 'processing'
            "#,
        )
        .bind(now)
        .bind(now)
        .execute(&mut *transaction)
        .await
        .context("Failed to requeue interrupted tasks")?
        .rows_affected();

        transaction
            .commit()
            .await
            .context("Failed to commit task recovery")?;

        if requeued > 0 || failed > 0 {
            warn!(
                "Recovered interrupted tasks: {} requeued, {} failed",
                requeued, failed
            );
        }
        Ok((requeued, failed))
    }

    #[inline]
    pub async fn stats(pool: &SqlitePool) -> Result<TaskStats> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS count FROM tasks GROUP BY status")
            .fetch_all(pool)
            .await
            .context("Failed to get task statistics")?;

        let mut stats = TaskStats::default();
        for row in rows {
            let status: TaskStatus = row.try_get("status")?;
            let count: i64 = row.try_get("count")?;
            let count = count.max(0) as u64;
            match status {
                TaskStatus::Pending => stats.pending = count,
                TaskStatus::Processing => stats.processing = count,
                TaskStatus::Completed => stats.completed = count,
                TaskStatus::Failed => stats.failed = count,
            }
        }
        Ok(stats)
    }

    /// Delete completed and failed tasks last updated before `cutoff`
    #[inline]
    pub async fn delete_finished_before(pool: &SqlitePool, cutoff: NaiveDateTime) -> Result<u64> {
        let deleted = sqlx::query(
            r#"
            DELETE FROM tasks
            WHERE status IN ('completed', 'failed') AND updated_at < ?
            "#,
        )
        .bind(cutoff)
        .execute(pool)
        .await
        .context("Failed to delete finished tasks")?
        .rows_affected();

        debug!("Deleted {} finished tasks", deleted);
        Ok(deleted)
    }
}

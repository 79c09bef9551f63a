use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::database::sqlite::models::{NewTask, Task, TaskStats};
use crate::database::sqlite::queries::TaskQueries;

#[cfg(test)]
mod tests;

pub mod models;
pub mod queries;

pub type DbPool = Pool<Sqlite>;

#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    pub async fn new<P: AsRef<Path>>(database_url: P) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_url)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(10));

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .context("Failed to create database connection pool")?;

        let database = Self { pool };
        database.run_migrations().await?;

        Ok(database)
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("src/database/sqlite/migrations")
            .run(&self.pool)
            .await
            .context("Failed to run schema migration")?;

        debug!("Database migrations completed successfully");
        Ok(())
    }

    pub async fn initialize_from_config_dir(config_dir: &Path) -> Result<Self> {
        let db_path = config_dir.join("metadata.db");

        std::fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        Self::new(&db_path).await
    }

    // Task operations
    pub async fn insert_task(&self, task: NewTask) -> Result<Task> {
        TaskQueries::create(&self.pool, task).await
    }

    pub async fn get_task(&self, id: &str) -> Result<Option<Task>> {
        TaskQueries::get_by_id(&self.pool, id).await
    }

    pub async fn claim_next_task(&self, now: NaiveDateTime) -> Result<Option<Task>> {
        TaskQueries::claim_next(&self.pool, now).await
    }

    pub async fn complete_task(&self, id: &str, result: &str) -> Result<bool> {
        TaskQueries::mark_completed(&self.pool, id, result).await
    }

    pub async fn reschedule_task(
        &self,
        id: &str,
        error: &str,
        available_at: NaiveDateTime,
    ) -> Result<bool> {
        TaskQueries::reschedule(&self.pool, id, error, available_at).await
    }

    pub async fn fail_task(&self, id: &str, error: &str) -> Result<bool> {
        TaskQueries::mark_failed(&self.pool, id, error).await
    }

    pub async fn reset_processing_tasks(&self) -> Result<(u64, u64)> {
        TaskQueries::reset_processing(&self.pool).await
    }

    pub async fn task_stats(&self) -> Result<TaskStats> {
        TaskQueries::stats(&self.pool).await
    }

    pub async fn delete_finished_tasks_before(&self, cutoff: NaiveDateTime) -> Result<u64> {
        TaskQueries::delete_finished_before(&self.pool, cutoff).await
    }

    /// Optimize database performance by running VACUUM and ANALYZE
    pub async fn optimize(&self) -> Result<()> {
        info!("Optimizing database performance");

        sqlx::query("VACUUM")
            .execute(&self.pool)
            .await
            .context("Failed to vacuum database")?;

        sqlx::query("ANALYZE")
            .execute(&self.pool)
            .await
            .context("Failed to analyze database")?;

        debug!("Database optimization completed");
        Ok(())
    }
}

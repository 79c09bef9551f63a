use super::*;
use crate::database::sqlite::models::{TaskKind, TaskStatus};
use anyhow::Result;
use chrono::Utc;
use std::collections::HashSet;
use tempfile::TempDir;

async fn create_test_database() -> Result<(TempDir, Database)> {
    let temp_dir = TempDir::new()?;
    let database = Database::initialize_from_config_dir(temp_dir.path()).await?;
    Ok((temp_dir, database))
}

#[tokio::test]
async fn integration_schema_migration() -> Result<()> {
    let (temp_dir, database) = create_test_database().await?;
    assert!(temp_dir.path().join("metadata.db").exists());

    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' AND name NOT LIKE '_sqlx%'",
    )
    .fetch_all(database.pool())
    .await?;

    let actual_tables: HashSet<&str> = tables.iter().map(|t| t.as_str()).collect();
    assert_eq!(actual_tables, HashSet::from(["tasks"]));

    Ok(())
}

#[tokio::test]
async fn migrations_are_idempotent() -> Result<()> {
    let (temp_dir, database) = create_test_database().await?;
    database.run_migrations().await?;
    drop(database);

    let reopened = Database::initialize_from_config_dir(temp_dir.path()).await?;
    assert_eq!(reopened.task_stats().await?.total(), 0);
    Ok(())
}

#[tokio::test]
async fn task_lifecycle_through_database() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;

    let task = database
        .insert_task(NewTask {
            kind: TaskKind::DeleteDocument,
            payload: r#"{"documentId":"d1","workspaceId":"w1"}"#.to_string(),
            max_attempts: 3,
        })
        .await?;

    let claimed = database
        .claim_next_task(Utc::now().naive_utc())
        .await?
        .expect("task should be due");
    assert_eq!(claimed.id, task.id);

    assert!(database.fail_task(&task.id, "document missing").await?);
    let stored = database.get_task(&task.id).await?.expect("task exists");
    assert_eq!(stored.status, TaskStatus::Failed);
    assert_eq!(stored.last_error.as_deref(), Some("document missing"));

    let stats = database.task_stats().await?;
    assert_eq!(stats.failed, 1);

    database.optimize().await?;
    Ok(())
}

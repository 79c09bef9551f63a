use anyhow::{Context, Result};
use std::time::Duration;

use crate::config::{Config, EmbeddingProviderKind};
use crate::database::Database;
use crate::database::lancedb::VectorStore;
use crate::embeddings::{OllamaClient, create_embedder};
use crate::tasks::TaskQueue;

/// Print connectivity of every backing service plus index and queue counts
#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    println!("📊 Chat RAG Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🗄️  Task Database:");
    let database = match Database::initialize_from_config_dir(config.get_base_dir()).await {
        Ok(db) => {
            println!("   ✅ SQLite: {}", config.database_path().display());
            Some(db)
        }
        Err(e) => {
            println!("   ❌ SQLite: Failed to open - {:#}", e);
            None
        }
    };

    println!("🤖 Ollama:");
    match OllamaClient::new(config) {
        Ok(client) => match client.health_check() {
            Ok(()) => {
                println!(
                    "   ✅ Connected ({}:{})",
                    config.ollama.host, config.ollama.port
                );
            }
            Err(e) => println!("   ⚠️  Unreachable - {:#}", e),
        },
        Err(e) => println!("   ❌ Invalid settings - {:#}", e),
    }
    match config.embeddings.provider {
        EmbeddingProviderKind::Ollama => {
            println!("   📋 Embedding model: {}", config.embeddings.model);
        }
        EmbeddingProviderKind::Hashing => println!("   📋 Embedding model: local hashing"),
    }
    println!("   💬 Generation model: {}", config.generation.model);

    println!("🔍 Vector Index:");
    match create_embedder(config) {
        Ok(embedder) => match VectorStore::new(config, embedder).await {
            Ok(store) => match store.count(None).await {
                Ok(records) => println!("   ✅ LanceDB: {} records", records),
                Err(e) => println!("   ⚠️  LanceDB: Opened but unreadable - {}", e),
            },
            Err(e) => println!("   ❌ LanceDB: Failed to open - {}", e),
        },
        Err(e) => println!("   ❌ Embedder: {}", e),
    }

    if let Some(database) = database {
        let queue = TaskQueue::new(database, &config.queue);
        let stats = queue.stats().await?;
        println!();
        println!("🔄 Task Queue:");
        println!("   ⏳ Pending: {}", stats.pending);
        println!("   🔄 Processing: {}", stats.processing);
        println!("   ✅ Completed: {}", stats.completed);
        println!("   ❌ Failed: {}", stats.failed);
        println!("   📦 Total: {}", stats.total());
    }

    Ok(())
}

/// Remove finished tasks and compact both databases
#[inline]
pub async fn cleanup(config: &Config, older_than: Option<Duration>) -> Result<()> {
    let age = older_than.unwrap_or_else(|| Duration::from_secs(config.queue.cleanup_age_seconds));

    let database = Database::initialize_from_config_dir(config.get_base_dir())
        .await
        .context("Failed to open task database")?;
    let queue = TaskQueue::new(database.clone(), &config.queue);
    let removed = queue.cleanup_finished(age).await?;
    println!(
        "🧹 Removed {} finished tasks older than {}s",
        removed,
        age.as_secs()
    );

    database
        .optimize()
        .await
        .context("Failed to optimize task database")?;

    let store = VectorStore::new(config, create_embedder(config)?).await?;
    store.optimize().await?;
    println!("✅ Compacted the vector index");

    Ok(())
}

// Ingestion module
// Turns chat messages and uploaded documents into stored records


pub mod callback;
pub mod extract;
pub mod fetch;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::database::lancedb::{
    DeleteCriteria, DocumentOrigin, MessageOrigin, NewRecord, QueryScope, RecordOrigin,
    VectorStore,
};
use crate::embeddings::{ChunkingConfig, chunk_text, join_sources};
use crate::{RagError, Result};

pub use callback::{CallbackClient, CallbackTarget, DocumentCallback, DocumentStatus};
pub use extract::{ContentKind, extract_text};
pub use fetch::{BlobFetcher, DownloadedBlob, file_suffix};

/// A chat message to be indexed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEvent {
    pub id: String,
    pub content: String,
    pub channel_id: String,
    pub workspace_id: String,
    pub user_id: String,
    pub user_name: String,
    pub channel_name: String,
    pub created_at: DateTime<Utc>,
}

/// An uploaded document to fetch, chunk and index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentJob {
    pub document_id: String,
    pub workspace_id: String,
    pub file_url: String,
    pub file_name: String,
    /// MIME type hint from the uploader
    #[serde(default)]
    pub file_type: String,
}

/// Removal of every chunk of one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteDocumentJob {
    pub document_id: String,
    pub workspace_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_token: Option<String>,
}

/// Result of a successful document ingestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentOutcome {
    pub document_id: String,
    pub chunks: usize,
    pub vector_ids: Vec<String>,
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(RagError::Validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

impl MessageEvent {
    #[inline]
    pub fn validate(&self) -> Result<()> {
        require("id", &self.id)?;
        require("content", &self.content)?;
        require("workspaceId", &self.workspace_id)?;
        require("channelId", &self.channel_id)?;
        require("userId", &self.user_id)
    }
}

impl DocumentJob {
    #[inline]
    pub fn validate(&self) -> Result<()> {
        require("documentId", &self.document_id)?;
        require("workspaceId", &self.workspace_id)?;
        require("fileName", &self.file_name)?;
        require("fileUrl", &self.file_url)?;

        let url = Url::parse(&self.file_url)
            .map_err(|e| RagError::Validation(format!("Invalid fileUrl: {}", e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(RagError::Validation(format!(
                "fileUrl must use http or https, got {}",
                url.scheme()
            )));
        }
        Ok(())
    }
}

impl DeleteDocumentJob {
    #[inline]
    pub fn validate(&self) -> Result<()> {
        require("documentId", &self.document_id)?;
        require("workspaceId", &self.workspace_id)
    }

    /// Callback destination, present only when both URL and token were supplied
    #[inline]
    pub fn callback_target(&self) -> Option<CallbackTarget> {
        match (&self.callback_url, &self.callback_token) {
            (Some(url), Some(token)) if !url.trim().is_empty() => Some(CallbackTarget {
                url: url.clone(),
                token: token.clone(),
            }),
            _ => None,
        }
    }
}

/// Message and document ingestion over an injected vector store.
///
/// Documents are fetched, extracted, chunked and embedded completely before the
/// single upsert, so a failure at any step leaves nothing behind in the index.
#[derive(Debug, Clone)]
pub struct IngestionPipeline {
    store: VectorStore,
    fetcher: BlobFetcher,
    chunking: ChunkingConfig,
}

impl IngestionPipeline {
    #[inline]
    pub fn new(store: VectorStore, fetcher: BlobFetcher, chunking: ChunkingConfig) -> Self {
        Self {
            store,
            fetcher,
            chunking,
        }
    }

    #[inline]
    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    /// Store one message as one record and return its vector identifier
    #[inline]
    pub async fn ingest_message(&self, event: &MessageEvent) -> Result<String> {
        event.validate()?;
        debug!(
            "Ingesting message {} for workspace {}",
            event.id, event.workspace_id
        );

        let vector = self.store.embedder().embed_one(&event.content).await?;
        let record = NewRecord {
            workspace_id: event.workspace_id.clone(),
            text: event.content.clone(),
            vector,
            origin: RecordOrigin::Message(MessageOrigin {
                message_id: event.id.clone(),
                user_id: event.user_id.clone(),
                channel_id: event.channel_id.clone(),
                user_name: event.user_name.clone(),
                channel_name: event.channel_name.clone(),
                timestamp: event.created_at.to_rfc3339(),
            }),
        };

        let vector_id = self
            .store
            .upsert(vec![record])
            .await?
            .pop()
            .ok_or_else(|| RagError::Database("Upsert returned no identifier".to_string()))?;

        info!("Indexed message {} as {}", event.id, vector_id);
        Ok(vector_id)
    }

    /// Fetch, extract, chunk, embed and store a document
    #[inline]
    pub async fn ingest_document(&self, job: &DocumentJob) -> Result<DocumentOutcome> {
        job.validate()?;
        let kind = ContentKind::detect(&job.file_type, &job.file_name)?;
        info!(
            "Processing document {} ({}) for workspace {}",
            job.document_id, job.file_name, job.workspace_id
        );

        let blob = self
            .fetcher
            .fetch(&job.file_url, &file_suffix(&job.file_name))
            .await?;
        let sources = extract_text(blob.path(), kind).await;
        if let Err(e) = blob.close() {
            warn!("Failed to remove downloaded file: {}", e);
        }
        let sources = sources?;

        let chunks = chunk_text(&join_sources(&sources), &self.chunking);
        if chunks.is_empty() {
            return Err(RagError::Validation(format!(
                "Document {} contains no extractable text",
                job.file_name
            )));
        }
        debug!("Split document {} into {} chunks", job.document_id, chunks.len());

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = self.store.embedder().embed(&texts).await?;
        if vectors.len() != chunks.len() {
            return Err(RagError::EmbeddingUnavailable(format!(
                "Expected {} embeddings, received {}",
                chunks.len(),
                vectors.len()
            )));
        }

        let records = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| NewRecord {
                workspace_id: job.workspace_id.clone(),
                text: chunk.content,
                vector,
                origin: RecordOrigin::Document(DocumentOrigin {
                    document_id: job.document_id.clone(),
                    file_name: job.file_name.clone(),
                    chunk_index: chunk.chunk_index as u32,
                }),
            })
            .collect();

        let vector_ids = self.store.upsert(records).await?;
        info!(
            "Indexed document {} as {} chunks",
            job.document_id,
            vector_ids.len()
        );

        Ok(DocumentOutcome {
            document_id: job.document_id.clone(),
            chunks: vector_ids.len(),
            vector_ids,
        })
    }

    /// Remove every chunk of a document within its workspace
    #[inline]
    pub async fn delete_document(&self, workspace_id: &str, document_id: &str) -> Result<u64> {
        require("documentId", document_id)?;
        let scope = QueryScope::workspace(workspace_id)?.with_document(document_id);
        let deleted = self
            .store
            .delete(workspace_id, DeleteCriteria::Scope(scope))
            .await?;
        info!(
            "Deleted {} chunks of document {} in workspace {}",
            deleted, document_id, workspace_id
        );
        Ok(deleted)
    }
}

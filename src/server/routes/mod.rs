//! HTTP route handlers
//!
//! - `messages`: chat message ingestion
//! - `search`: similarity search and answer generation
//! - `documents`: synchronous document ingestion and removal
//! - `vectors`: deletion by vector identifier
//! - `health`: liveness with index and queue counts

pub mod documents;
pub mod health;
pub mod messages;
pub mod search;
pub mod vectors;

use serde::{Deserialize, Serialize};

use crate::database::lancedb::{RecordOrigin, ScoredRecord};
use crate::server::error::ApiError;

/// A retrieved record as reported to clients.
///
/// Message fields are present for message records, document fields for
/// document chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRecord {
    pub content: String,
    pub score: f32,
    pub vector_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<u32>,
}

impl From<ScoredRecord> for SourceRecord {
    #[inline]
    fn from(hit: ScoredRecord) -> Self {
        let mut source = Self {
            content: hit.record.text,
            score: hit.score,
            vector_id: hit.record.id,
            message_id: None,
            user_name: None,
            channel_name: None,
            timestamp: None,
            document_id: None,
            file_name: None,
            chunk_index: None,
        };

        match hit.record.origin {
            RecordOrigin::Message(message) => {
                source.message_id = Some(message.message_id);
                source.user_name = Some(message.user_name);
                source.channel_name = Some(message.channel_name);
                source.timestamp = Some(message.timestamp);
            }
            RecordOrigin::Document(document) => {
                source.document_id = Some(document.document_id);
                source.file_name = Some(document.file_name);
                source.chunk_index = Some(document.chunk_index);
            }
        }
        source
    }
}

/// Fallback for undefined routes
#[inline]
pub async fn not_found() -> ApiError {
    ApiError(crate::RagError::NotFound("no such endpoint".to_string()))
}

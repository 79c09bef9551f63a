// LanceDB vector database module
// Tenant-scoped storage and similarity search for message and document records

#[cfg(test)]
mod tests;

pub mod scope;
pub mod vector_store;

use serde::{Deserialize, Serialize};

pub use scope::{DeleteCriteria, QueryScope};
pub use vector_store::VectorStore;

/// Metadata of a record created from a chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageOrigin {
    pub message_id: String,
    pub user_id: String,
    pub channel_id: String,
    pub user_name: String,
    pub channel_name: String,
    /// RFC 3339 creation time of the message
    pub timestamp: String,
}

/// Metadata of a record created from one chunk of an uploaded document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentOrigin {
    pub document_id: String,
    pub file_name: String,
    pub chunk_index: u32,
}

/// Where a record's text came from. Every record has exactly one origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RecordOrigin {
    Message(MessageOrigin),
    Document(DocumentOrigin),
}

impl RecordOrigin {
    /// Value stored in the `origin` column
    #[inline]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Message(_) => "message",
            Self::Document(_) => "document",
        }
    }
}

/// A record to be written; the store assigns its identifier
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub workspace_id: String,
    pub text: String,
    pub vector: Vec<f32>,
    pub origin: RecordOrigin,
}

/// A record read back from the index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: String,
    pub workspace_id: String,
    pub text: String,
    pub origin: RecordOrigin,
    pub created_at: String,
}

impl StoredRecord {
    #[inline]
    pub fn message(&self) -> Option<&MessageOrigin> {
        match &self.origin {
            RecordOrigin::Message(message) => Some(message),
            RecordOrigin::Document(_) => None,
        }
    }

    #[inline]
    pub fn document(&self) -> Option<&DocumentOrigin> {
        match &self.origin {
            RecordOrigin::Document(document) => Some(document),
            RecordOrigin::Message(_) => None,
        }
    }
}

/// Search hit with its similarity to the query (higher is closer)
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub record: StoredRecord,
    pub score: f32,
    pub distance: f32,
}

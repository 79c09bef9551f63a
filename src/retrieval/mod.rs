// Retrieval and response module
// Scoped similarity search plus answer generation over the retrieved context


use std::sync::Arc;
use tracing::{debug, info};

use crate::database::lancedb::{QueryScope, RecordOrigin, ScoredRecord, VectorStore};
use crate::generation::{ContextPassage, Generator, ResponseMode};
use crate::{RagError, Result};

/// Reported when at least one record was retrieved.
///
/// Confidence is a coarse signal of whether any context backed the answer,
/// not a calibrated probability.
pub const CONFIDENCE_WITH_CONTEXT: f32 = 1.0;
/// Reported when retrieval found nothing and the answer is ungrounded
pub const CONFIDENCE_WITHOUT_CONTEXT: f32 = 0.5;

pub const DEFAULT_LIMIT: usize = 5;
pub const MAX_LIMIT: usize = 50;

/// A generated answer and the records it was grounded on
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedAnswer {
    pub response: String,
    pub confidence: f32,
    pub sources: Vec<ScoredRecord>,
}

#[derive(Debug, Clone)]
pub struct RetrievalService {
    store: VectorStore,
    generator: Arc<dyn Generator>,
}

/// Confidence for an answer backed by `retrieved` records
#[inline]
pub fn confidence_for(retrieved: usize) -> f32 {
    if retrieved > 0 {
        CONFIDENCE_WITH_CONTEXT
    } else {
        CONFIDENCE_WITHOUT_CONTEXT
    }
}

/// Check a caller-supplied result limit
#[inline]
pub fn validate_limit(limit: usize) -> Result<usize> {
    if (1..=MAX_LIMIT).contains(&limit) {
        Ok(limit)
    } else {
        Err(RagError::Validation(format!(
            "limit must be between 1 and {}, got {}",
            MAX_LIMIT, limit
        )))
    }
}

/// Scope for peer-conversational retrieval: one workspace, one counterpart, optionally one channel
#[inline]
pub fn peer_scope(workspace_id: &str, user_id: &str, channel_id: Option<&str>) -> Result<QueryScope> {
    if user_id.trim().is_empty() {
        return Err(RagError::Validation(
            "receiverId must not be empty".to_string(),
        ));
    }
    let scope = QueryScope::workspace(workspace_id)?.with_user(user_id);
    Ok(match channel_id.filter(|c| !c.trim().is_empty()) {
        Some(channel_id) => scope.with_channel(channel_id),
        None => scope,
    })
}

impl RetrievalService {
    #[inline]
    pub fn new(store: VectorStore, generator: Arc<dyn Generator>) -> Self {
        Self { store, generator }
    }

    /// Records most similar to `query` inside `scope`, best first
    #[inline]
    pub async fn search(
        &self,
        query: &str,
        scope: &QueryScope,
        limit: usize,
    ) -> Result<Vec<ScoredRecord>> {
        if query.trim().is_empty() {
            return Err(RagError::Validation("query must not be empty".to_string()));
        }
        let limit = validate_limit(limit)?;

        let results = self.store.query(query, scope, limit).await?;
        debug!(
            "Retrieved {} records for workspace {}",
            results.len(),
            scope.workspace_id()
        );
        Ok(results)
    }

    /// Retrieve context for `query` and generate an answer in the given mode
    #[inline]
    pub async fn respond(
        &self,
        query: &str,
        scope: &QueryScope,
        limit: usize,
        mode: ResponseMode,
    ) -> Result<GeneratedAnswer> {
        let sources = self.search(query, scope, limit).await?;
        let passages = context_passages(&sources);
        let prompt = mode.render_prompt(&passages, query);

        let response = self
            .generator
            .generate(mode.system_prompt(), &prompt)
            .await?;
        let confidence = confidence_for(sources.len());

        info!(
            "Generated {:?} answer from {} sources (confidence {})",
            mode,
            sources.len(),
            confidence
        );
        Ok(GeneratedAnswer {
            response,
            confidence,
            sources,
        })
    }
}

fn context_passages(records: &[ScoredRecord]) -> Vec<ContextPassage> {
    records
        .iter()
        .map(|hit| ContextPassage {
            text: hit.record.text.clone(),
            source: match &hit.record.origin {
                RecordOrigin::Document(document) => Some(format!(
                    "{}, chunk {}",
                    document.file_name, document.chunk_index
                )),
                RecordOrigin::Message(message) => Some(format!(
                    "{} in #{}",
                    message.user_name, message.channel_name
                )),
            },
        })
        .collect()
}

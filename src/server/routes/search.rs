use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::SourceRecord;
use crate::database::lancedb::QueryScope;
use crate::generation::ResponseMode;
use crate::retrieval::{DEFAULT_LIMIT, GeneratedAnswer, peer_scope};
use crate::server::error::ApiResult;
use crate::server::state::AppState;

const fn default_limit() -> usize {
    DEFAULT_LIMIT
}

/// Query over one counterpart's messages, optionally narrowed to a channel
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerQueryRequest {
    pub query: String,
    pub workspace_id: String,
    #[serde(default)]
    pub channel_id: Option<String>,
    pub receiver_id: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

/// Query over everything indexed in a workspace
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeBaseRequest {
    pub query: String,
    pub workspace_id: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub messages: Vec<SourceRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub response: String,
    pub confidence: f32,
    pub source_messages: Vec<SourceRecord>,
}

impl From<GeneratedAnswer> for GenerateResponse {
    #[inline]
    fn from(answer: GeneratedAnswer) -> Self {
        Self {
            response: answer.response,
            confidence: answer.confidence,
            source_messages: answer.sources.into_iter().map(SourceRecord::from).collect(),
        }
    }
}

impl PeerQueryRequest {
    fn scope(&self) -> crate::Result<QueryScope> {
        peer_scope(
            &self.workspace_id,
            &self.receiver_id,
            self.channel_id.as_deref(),
        )
    }
}

/// Similarity search without generation
#[inline]
pub async fn search(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PeerQueryRequest>, JsonRejection>,
) -> ApiResult<Json<SearchResponse>> {
    let Json(request) = payload?;
    let scope = request.scope()?;

    let results = state
        .retrieval
        .search(&request.query, &scope, request.limit)
        .await?;

    Ok(Json(SearchResponse {
        messages: results.into_iter().map(SourceRecord::from).collect(),
    }))
}

/// Answer in the voice of a conversation partner
#[inline]
pub async fn generate(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PeerQueryRequest>, JsonRejection>,
) -> ApiResult<Json<GenerateResponse>> {
    let Json(request) = payload?;
    let scope = request.scope()?;

    let answer = state
        .retrieval
        .respond(
            &request.query,
            &scope,
            request.limit,
            ResponseMode::Conversational,
        )
        .await?;
    Ok(Json(answer.into()))
}

/// Summarized answer from everything in the workspace
#[inline]
pub async fn knowledge_base_generate(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<KnowledgeBaseRequest>, JsonRejection>,
) -> ApiResult<Json<GenerateResponse>> {
    let Json(request) = payload?;
    let scope = QueryScope::workspace(&request.workspace_id)?;

    let answer = state
        .retrieval
        .respond(
            &request.query,
            &scope,
            request.limit,
            ResponseMode::KnowledgeBase,
        )
        .await?;
    Ok(Json(answer.into()))
}

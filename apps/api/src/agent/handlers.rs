use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::agent::run_assistant;
use crate::errors::AppError;
use crate::ingest::IngestError;
use crate::models::chat::{AssistantRequest, AssistantResponse};
use crate::search::{MessageMatch, ResumeChunkMatch, DEFAULT_MATCH_THRESHOLD};
use crate::state::AppState;

/// Header carrying a caller-supplied LLM/embedding key (demo mode).
const LLM_KEY_HEADER: &str = "x-llm-api-key";

/// POST /api/chat
pub async fn handle_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<AssistantRequest>,
) -> Result<Json<AssistantResponse>, AppError> {
    let key_override = headers
        .get(LLM_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty());

    let response = run_assistant(&state, request, key_override).await?;
    Ok(Json(response))
}

#[derive(Debug, Serialize)]
pub struct ResumeCheckResponse {
    pub has_resume: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_id: Option<String>,
}

/// GET /api/resume/check/:user_id
pub async fn handle_resume_check(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ResumeCheckResponse>, AppError> {
    let info = state.ingestor.check_resume_exists(Some(&user_id)).await?;
    Ok(Json(ResumeCheckResponse {
        has_resume: info.has_resume,
        resume_id: info.resume_id,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ResumeSearchQuery {
    pub query: String,
    pub user_id: Option<String>,
    #[serde(default = "default_search_limit")]
    pub limit: i32,
}

fn default_search_limit() -> i32 {
    5
}

#[derive(Debug, Serialize)]
pub struct ResumeSearchResponse {
    pub results: Vec<ResumeChunkMatch>,
}

/// GET /api/resume/search
pub async fn handle_resume_search(
    State(state): State<AppState>,
    Query(query): Query<ResumeSearchQuery>,
) -> Result<Json<ResumeSearchResponse>, AppError> {
    let results = state
        .search
        .match_resume_content(
            &query.query,
            query.user_id.as_deref(),
            DEFAULT_MATCH_THRESHOLD,
            query.limit.clamp(1, 50),
        )
        .await?;
    Ok(Json(ResumeSearchResponse { results }))
}

#[derive(Debug, Deserialize)]
pub struct JobMatchQuery {
    pub user_id: String,
    #[serde(default = "default_search_limit")]
    pub limit: i32,
}

#[derive(Debug, Serialize)]
pub struct JobMatchResponse {
    pub resume_id: String,
    pub matches: Vec<crate::search::JobListingMatch>,
}

/// GET /api/resume/matches
///
/// Matches a user's stored resume against job listings using the
/// resume's stored embedding (no fresh embed call).
pub async fn handle_resume_job_matches(
    State(state): State<AppState>,
    Query(query): Query<JobMatchQuery>,
) -> Result<Json<JobMatchResponse>, AppError> {
    let info = state.ingestor.check_resume_exists(Some(&query.user_id)).await?;
    let Some(resume_id) = info.resume_id else {
        return Err(AppError::NotFound(format!(
            "No resume stored for user {}",
            query.user_id
        )));
    };

    let embedding = match state.ingestor.first_chunk_embedding(&resume_id).await {
        Ok(embedding) => embedding,
        Err(IngestError::Storage(e)) => return Err(AppError::Database(e)),
        Err(e) => return Err(AppError::NotFound(e.to_string())),
    };
    let matches = state
        .search
        .match_resume_to_jobs(embedding, DEFAULT_MATCH_THRESHOLD, query.limit.clamp(1, 50))
        .await?;

    Ok(Json(JobMatchResponse { resume_id, matches }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageScope {
    Conversation,
    Training,
}

#[derive(Debug, Deserialize)]
pub struct MessageSearchQuery {
    pub query: String,
    pub scope: MessageScope,
    pub user_id: Option<String>,
    #[serde(default = "default_search_limit")]
    pub limit: i32,
}

#[derive(Debug, Serialize)]
pub struct MessageSearchResponse {
    pub results: Vec<MessageMatch>,
}

/// GET /api/search/messages
///
/// Searches stored conversation history or the curated training corpus.
pub async fn handle_message_search(
    State(state): State<AppState>,
    Query(query): Query<MessageSearchQuery>,
) -> Result<Json<MessageSearchResponse>, AppError> {
    let limit = query.limit.clamp(1, 50);
    let results = match query.scope {
        MessageScope::Conversation => {
            state
                .search
                .search_conversation_messages(
                    &query.query,
                    query.user_id.as_deref(),
                    DEFAULT_MATCH_THRESHOLD,
                    limit,
                )
                .await?
        }
        MessageScope::Training => {
            state
                .search
                .search_training_messages(&query.query, DEFAULT_MATCH_THRESHOLD, limit)
                .await?
        }
    };
    Ok(Json(MessageSearchResponse { results }))
}

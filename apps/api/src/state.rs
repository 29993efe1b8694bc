use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::AuthClient;
use crate::config::Config;
use crate::embeddings::EmbeddingClient;
use crate::ingest::DocumentIngestor;
use crate::llm_client::LlmClient;
use crate::pipeline::PipelineManager;
use crate::rate_limit::RateLimiter;
use crate::search::SimilaritySearch;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub llm: LlmClient,
    pub embeddings: EmbeddingClient,
    pub auth: AuthClient,
    pub search: SimilaritySearch,
    pub ingestor: Arc<DocumentIngestor>,
    pub pipeline: Arc<PipelineManager>,
    pub limiter: Arc<RateLimiter>,
    pub config: Config,
}

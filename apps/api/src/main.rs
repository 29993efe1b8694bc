mod agent;
mod auth;
mod config;
mod db;
mod embeddings;
mod errors;
mod ingest;
mod llm_client;
mod models;
mod pipeline;
mod rate_limit;
mod routes;
mod search;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::auth::AuthClient;
use crate::config::Config;
use crate::db::create_pool;
use crate::embeddings::EmbeddingClient;
use crate::ingest::DocumentIngestor;
use crate::llm_client::LlmClient;
use crate::pipeline::{processor::IngestProcessor, PipelineManager};
use crate::rate_limit::RateLimiter;
use crate::routes::build_router;
use crate::search::SimilaritySearch;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting climate-careers assistant API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // External service clients
    let auth = AuthClient::new(config.auth_url.clone(), config.auth_service_key.clone());
    let llm = LlmClient::new(config.llm_api_key.clone(), config.llm_model.clone());
    info!("LLM client initialized (model: {})", llm.model());

    let embeddings = EmbeddingClient::new(
        config.embedding_api_key.clone(),
        &config.embedding_base_url,
        config.embedding_model.clone(),
        config.embedding_dimensions,
    );
    info!(
        "Embedding client initialized (model: {}, {} dimensions)",
        config.embedding_model, config.embedding_dimensions
    );

    // Ingest pipeline + worker pool
    let ingestor = Arc::new(DocumentIngestor::new(
        db.clone(),
        embeddings.clone(),
        config.chunk_size,
        config.chunk_overlap,
    ));
    let processor = Arc::new(IngestProcessor::new((*ingestor).clone()));
    let pipeline = PipelineManager::start(processor, config.worker_count, config.queue_capacity);

    let search = SimilaritySearch::new(db.clone(), embeddings.clone());
    let limiter = Arc::new(RateLimiter::new(
        config.rate_limit_per_minute,
        config.rate_limit_burst,
    ));

    // Build app state
    let state = AppState {
        db,
        llm,
        embeddings,
        auth,
        search,
        ingestor,
        pipeline,
        limiter,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()), // TODO: tighten CORS in production
    );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Base URL of the external auth provider (token validation endpoint).
    pub auth_url: String,
    pub auth_service_key: String,
    /// Server-side LLM key. Optional: chat callers may supply their own
    /// key per request via the `x-llm-api-key` header (demo mode).
    pub llm_api_key: Option<String>,
    pub llm_model: String,
    pub embedding_api_key: Option<String>,
    pub embedding_base_url: String,
    pub embedding_model: String,
    pub embedding_dimensions: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub worker_count: usize,
    pub queue_capacity: usize,
    pub rate_limit_per_minute: u32,
    pub rate_limit_burst: u32,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            auth_url: require_env("AUTH_URL")?,
            auth_service_key: require_env("AUTH_SERVICE_KEY")?,
            llm_api_key: optional_env("LLM_API_KEY"),
            llm_model: std::env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            embedding_api_key: optional_env("EMBEDDING_API_KEY")
                .or_else(|| optional_env("LLM_API_KEY")),
            embedding_base_url: std::env::var("EMBEDDING_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            embedding_model: std::env::var("EMBEDDING_MODEL")
                .unwrap_or_else(|_| "text-embedding-3-small".to_string()),
            embedding_dimensions: parse_env("EMBEDDING_DIMENSIONS", 1536)?,
            chunk_size: parse_env("CHUNK_SIZE", 400)?,
            chunk_overlap: parse_env("CHUNK_OVERLAP", 50)?,
            worker_count: parse_env("PIPELINE_WORKERS", 2)?,
            queue_capacity: parse_env("PIPELINE_QUEUE_CAPACITY", 256)?,
            rate_limit_per_minute: parse_env("RATE_LIMIT_PER_MINUTE", 60)?,
            rate_limit_burst: parse_env("RATE_LIMIT_BURST", 10)?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number")),
        Err(_) => Ok(default),
    }
}

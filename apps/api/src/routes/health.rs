use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// Pings the database and reports worker/job counts. Returns 503 when
/// the database is unreachable so load balancers rotate the instance out.
pub async fn health_handler(
    State(state): State<AppState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Err(e) = sqlx::query("SELECT 1").execute(&state.db).await {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "timestamp": Utc::now().to_rfc3339(),
                "error": e.to_string()
            })),
        ));
    }

    Ok(Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "service": "cea-api",
        "version": env!("CARGO_PKG_VERSION"),
        "embedding_model": state.config.embedding_model,
        "active_workers": state.pipeline.worker_count(),
        "active_jobs": state.pipeline.job_count().await
    })))
}

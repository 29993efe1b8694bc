pub mod health;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::agent::handlers as agent_handlers;
use crate::pipeline::handlers as pipeline_handlers;
use crate::rate_limit::rate_limit_middleware;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Ingestion pipeline
        .route("/process", post(pipeline_handlers::handle_process))
        .route(
            "/resume/upload",
            post(pipeline_handlers::handle_resume_upload),
        )
        .route("/resume/:user_id", get(pipeline_handlers::handle_get_resume))
        .route("/status/:job_id", get(pipeline_handlers::handle_job_status))
        .route("/jobs", get(pipeline_handlers::handle_list_jobs))
        .route("/batch", post(pipeline_handlers::handle_batch))
        // Assistant
        .route("/api/chat", post(agent_handlers::handle_chat))
        .route(
            "/api/resume/check/:user_id",
            get(agent_handlers::handle_resume_check),
        )
        .route(
            "/api/resume/search",
            get(agent_handlers::handle_resume_search),
        )
        .route(
            "/api/resume/matches",
            get(agent_handlers::handle_resume_job_matches),
        )
        .route(
            "/api/search/messages",
            get(agent_handlers::handle_message_search),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .with_state(state)
}

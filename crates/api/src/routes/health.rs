use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health payload: database reachability plus how the pipeline is wired.
#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when history cannot be written.
    pub status: &'static str,
    pub version: &'static str,
    pub db_healthy: bool,
    /// Whether `POST /api/v1/prompts/enhance` has an LLM behind it.
    pub prompt_enhancement: bool,
    pub background_polling: bool,
    /// Server-side poll loops currently running.
    pub active_poll_loops: usize,
    pub results_bucket: String,
}

/// GET /health
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = visionary_db::health_check(&state.pool).await.is_ok();
    if !db_healthy {
        tracing::warn!("Health check: database unreachable");
    }

    let pipeline = &state.pipeline;
    Json(HealthResponse {
        status: if db_healthy { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        prompt_enhancement: pipeline.enhancer.is_some(),
        background_polling: pipeline.config.background_polling,
        active_poll_loops: state.background.active(),
        results_bucket: pipeline.config.results_bucket.clone(),
    })
}

/// Root-level routes, outside `/api/v1`.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

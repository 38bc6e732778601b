pub mod health;
pub mod history;
pub mod prompts;
pub mod visualizations;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /visualizations                  start a visualization (POST)
/// /visualizations/status           run one poll cycle (POST)
///
/// /history                         list a user's records (GET)
///
/// /prompts/enhance                 enhance a prompt (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/visualizations", visualizations::router())
        .nest("/history", history::router())
        .nest("/prompts", prompts::router())
}

//! Route definitions for the `/visualizations` resource.

use axum::routing::post;
use axum::Router;

use crate::handlers::visualizations;
use crate::state::AppState;

/// Routes mounted at `/visualizations`.
///
/// ```text
/// POST   /                -> start_visualization
/// POST   /status          -> poll_status
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(visualizations::start_visualization))
        .route("/status", post(visualizations::poll_status))
}

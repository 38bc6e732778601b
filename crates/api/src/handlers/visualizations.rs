//! Handlers for starting and polling visualizations.

use axum::extract::State;
use axum::Json;
use visionary_core::visualization::StartVisualizationRequest;
use visionary_pipeline::{Orchestrator, PollRequest, PollResponse, StartResponse, StartService};

use crate::error::AppResult;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /visualizations
///
/// Validates the request, submits the base job and creates the history
/// record. Spawns a server-side poll loop when background polling is on.
pub async fn start_visualization(
    State(state): State<AppState>,
    Json(input): Json<StartVisualizationRequest>,
) -> AppResult<Json<StartResponse>> {
    let started = StartService::new(state.pipeline.clone()).start(input).await?;

    if state.pipeline.config.background_polling {
        state.background.spawn(state.pipeline.clone(), &started);
    }

    Ok(Json(started))
}

/// POST /visualizations/status
///
/// Runs one poll cycle for the given prediction. A job that finished
/// without usable output answers 200 with `success: false`.
pub async fn poll_status(
    State(state): State<AppState>,
    Json(input): Json<PollRequest>,
) -> AppResult<Json<PollResponse>> {
    let response = Orchestrator::new(state.pipeline.clone()).poll(&input).await?;
    Ok(Json(response))
}

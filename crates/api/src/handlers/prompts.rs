//! Prompt enhancement endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use visionary_pipeline::enhancer::EnhanceRequest;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhanceResponse {
    pub enhanced_prompt: String,
}

/// POST /prompts/enhance
pub async fn enhance_prompt(
    State(state): State<AppState>,
    Json(input): Json<EnhanceRequest>,
) -> AppResult<Json<EnhanceResponse>> {
    let enhancer = state
        .pipeline
        .enhancer
        .as_ref()
        .ok_or_else(|| AppError::ServiceUnavailable("Prompt enhancement is not configured".into()))?;

    let enhanced_prompt = enhancer.enhance(&input).await?;
    Ok(Json(EnhanceResponse { enhanced_prompt }))
}

//! Handlers for the creation history.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use visionary_core::types::UserId;
use visionary_db::models::history::HistoryRecord;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Query params for `GET /history`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub user_id: UserId,
    /// Page size. Defaults to 20, capped at 100.
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// GET /history?userId=&limit=&offset=
///
/// A user's visualizations, newest first.
pub async fn list_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryQuery>,
) -> AppResult<Json<DataResponse<Vec<HistoryRecord>>>> {
    let records = state
        .pipeline
        .history
        .list_by_user(params.user_id, params.limit, params.offset)
        .await?;
    Ok(Json(DataResponse { data: records }))
}

//! Shared response envelope types for API handlers.
//!
//! List endpoints answer with a `{ "data": ... }` envelope. The visualization
//! endpoints answer with their own `success`-flagged payloads.

use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
///
/// # Example
///
/// ```ignore
/// Ok(Json(DataResponse { data: items }))
/// ```
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

use serde::Serialize;
use sqlx::FromRow;
use visionary_core::types::Timestamp;

/// A row from the `processing_metadata` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProcessingMetadata {
    pub prediction_id: String,
    pub cancellation_attempted: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

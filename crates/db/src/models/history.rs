//! Creation history entity models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use visionary_core::types::{HistoryId, Timestamp, UserId};

/// Placeholder media URL written before a result has been persisted.
pub const PENDING_MEDIA_URL: &str = "pending";

/// A row from the `creation_history` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct HistoryRecord {
    pub id: HistoryId,
    pub user_id: Option<UserId>,
    pub original_prompt: Option<String>,
    pub enhanced_prompt: Option<String>,
    pub model_id: Option<String>,
    pub replicate_model: Option<String>,
    pub generation_input: Option<serde_json::Value>,
    pub media_type: Option<String>,
    pub status: String,
    pub status_message: Option<String>,
    pub progress: i16,
    pub media_url: Option<String>,
    pub original_url: Option<String>,
    pub base_media_url: Option<String>,
    pub face_swap_input_image: Option<String>,
    pub replicate_prediction_id: Option<String>,
    pub face_swap_prediction_id: Option<String>,
    pub face_swap_restarted: bool,
    pub saved_to_storage: bool,
    pub error_message: Option<String>,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl HistoryRecord {
    /// The prediction id currently being polled: the face-swap job once one
    /// exists, otherwise the base-generation job.
    pub fn active_prediction_id(&self) -> Option<&str> {
        self.face_swap_prediction_id
            .as_deref()
            .or(self.replicate_prediction_id.as_deref())
    }

    /// A saved result URL that can be reused instead of persisting again.
    pub fn saved_media_url(&self) -> Option<&str> {
        match self.media_url.as_deref() {
            Some(url) if self.saved_to_storage && url != PENDING_MEDIA_URL => Some(url),
            _ => None,
        }
    }
}

/// DTO for inserting (or re-inserting) a history record.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateHistory {
    pub id: HistoryId,
    pub user_id: Option<UserId>,
    pub original_prompt: Option<String>,
    pub enhanced_prompt: Option<String>,
    pub model_id: Option<String>,
    pub replicate_model: Option<String>,
    pub generation_input: Option<serde_json::Value>,
    pub media_type: Option<String>,
    pub status: String,
    pub status_message: Option<String>,
    pub progress: i16,
    pub face_swap_input_image: Option<String>,
    pub replicate_prediction_id: Option<String>,
}

/// Partial update. `None` fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateHistory {
    pub status: Option<String>,
    pub status_message: Option<String>,
    pub progress: Option<i16>,
    pub media_url: Option<String>,
    pub original_url: Option<String>,
    pub base_media_url: Option<String>,
    pub error_message: Option<String>,
    pub replicate_prediction_id: Option<String>,
    pub face_swap_prediction_id: Option<String>,
    pub face_swap_restarted: Option<bool>,
    /// Stamp `completed_at` (kept if already set).
    #[serde(default)]
    pub completed: bool,
}

//! Repository for the `processing_metadata` table.

use sqlx::PgPool;

use crate::models::processing_metadata::ProcessingMetadata;

const COLUMNS: &str = "prediction_id, cancellation_attempted, created_at, updated_at";

/// Tracks per-job stuck-restart attempts.
pub struct ProcessingMetadataRepo;

impl ProcessingMetadataRepo {
    /// Return the metadata row for a job, creating it on first access.
    pub async fn find_or_create(pool: &PgPool, prediction_id: &str) -> Result<ProcessingMetadata, sqlx::Error> {
        let query = format!(
            "INSERT INTO processing_metadata (prediction_id) VALUES ($1) \
             ON CONFLICT (prediction_id) DO UPDATE SET prediction_id = EXCLUDED.prediction_id \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ProcessingMetadata>(&query)
            .bind(prediction_id)
            .fetch_one(pool)
            .await
    }

    /// Flip `cancellation_attempted` to true.
    ///
    /// Returns `true` only for the caller that performed the flip; concurrent
    /// or later callers get `false`.
    pub async fn mark_cancellation_attempted(pool: &PgPool, prediction_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO processing_metadata (prediction_id, cancellation_attempted) \
             VALUES ($1, TRUE) \
             ON CONFLICT (prediction_id) DO UPDATE \
                 SET cancellation_attempted = TRUE, updated_at = NOW() \
                 WHERE processing_metadata.cancellation_attempted = FALSE",
        )
        .bind(prediction_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Clear `cancellation_attempted` after a cancel that never reached the
    /// provider. Returns `false` when the flag was not set.
    pub async fn release_cancellation(pool: &PgPool, prediction_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE processing_metadata SET cancellation_attempted = FALSE, updated_at = NOW() \
             WHERE prediction_id = $1 AND cancellation_attempted",
        )
        .bind(prediction_id)
        .execute(pool)
        .await?;
        let released = result.rows_affected() > 0;
        tracing::debug!(prediction_id, released, "Released cancellation flag");
        Ok(released)
    }
}

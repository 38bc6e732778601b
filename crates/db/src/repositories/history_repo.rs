//! Repository for the `creation_history` table.
//!
//! Every mutating query is a single statement so concurrent polls on the
//! same record are serialized by PostgreSQL row locks. The active-key
//! switch and the save flag are compare-and-set updates.

use sqlx::postgres::PgArguments;
use sqlx::query::QueryAs;
use sqlx::{PgPool, Postgres};
use visionary_core::job::JobKind;
use visionary_core::types::{HistoryId, UserId};

use crate::models::history::{CreateHistory, HistoryRecord, UpdateHistory, PENDING_MEDIA_URL};

/// Column list for `creation_history` queries.
const COLUMNS: &str = "\
    id, user_id, original_prompt, enhanced_prompt, model_id, replicate_model, \
    generation_input, media_type, status, status_message, progress, \
    media_url, original_url, base_media_url, face_swap_input_image, \
    replicate_prediction_id, face_swap_prediction_id, face_swap_restarted, \
    saved_to_storage, error_message, completed_at, created_at, updated_at";

/// SET clause shared by all partial updates. Binds `$2..=$10` in the order
/// used by [`bind_update`].
const UPDATE_SET: &str = "\
    status = COALESCE($2, status), \
    status_message = COALESCE($3, status_message), \
    progress = COALESCE($4, progress), \
    media_url = COALESCE($5, media_url), \
    original_url = COALESCE($6, original_url), \
    base_media_url = COALESCE($7, base_media_url), \
    error_message = COALESCE($8, error_message), \
    face_swap_restarted = COALESCE($9, face_swap_restarted), \
    completed_at = CASE WHEN $10 THEN COALESCE(completed_at, NOW()) ELSE completed_at END, \
    updated_at = NOW()";

/// Prediction-id assignments for plain partial updates (`$11`, `$12`).
const UPDATE_KEYS: &str = "\
    replicate_prediction_id = COALESCE($11, replicate_prediction_id), \
    face_swap_prediction_id = COALESCE($12, face_swap_prediction_id)";

/// Maximum page size for history listing.
const MAX_LIMIT: i64 = 100;

/// Default page size for history listing.
const DEFAULT_LIMIT: i64 = 20;

/// Column holding the prediction id for a job kind.
fn prediction_column(kind: JobKind) -> &'static str {
    match kind {
        JobKind::BaseGeneration => "replicate_prediction_id",
        JobKind::FaceSwap => "face_swap_prediction_id",
    }
}

fn bind_update<'q>(
    query: QueryAs<'q, Postgres, HistoryRecord, PgArguments>,
    input: &'q UpdateHistory,
) -> QueryAs<'q, Postgres, HistoryRecord, PgArguments> {
    query
        .bind(input.status.as_deref())
        .bind(input.status_message.as_deref())
        .bind(input.progress)
        .bind(input.media_url.as_deref())
        .bind(input.original_url.as_deref())
        .bind(input.base_media_url.as_deref())
        .bind(input.error_message.as_deref())
        .bind(input.face_swap_restarted)
        .bind(input.completed)
}

/// Provides persistence for visualization history records.
pub struct HistoryRepo;

impl HistoryRepo {
    /// Insert a record, or overwrite the creation fields of an existing one
    /// with the same id.
    pub async fn upsert(pool: &PgPool, input: &CreateHistory) -> Result<HistoryRecord, sqlx::Error> {
        let query = format!(
            "INSERT INTO creation_history \
                 (id, user_id, original_prompt, enhanced_prompt, model_id, replicate_model, \
                  generation_input, media_type, status, status_message, progress, \
                  face_swap_input_image, replicate_prediction_id, media_url) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             ON CONFLICT (id) DO UPDATE SET \
                 user_id = EXCLUDED.user_id, \
                 original_prompt = EXCLUDED.original_prompt, \
                 enhanced_prompt = EXCLUDED.enhanced_prompt, \
                 model_id = EXCLUDED.model_id, \
                 replicate_model = EXCLUDED.replicate_model, \
                 generation_input = EXCLUDED.generation_input, \
                 media_type = EXCLUDED.media_type, \
                 status = EXCLUDED.status, \
                 status_message = EXCLUDED.status_message, \
                 progress = EXCLUDED.progress, \
                 face_swap_input_image = EXCLUDED.face_swap_input_image, \
                 replicate_prediction_id = EXCLUDED.replicate_prediction_id, \
                 updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, HistoryRecord>(&query)
            .bind(input.id)
            .bind(input.user_id)
            .bind(&input.original_prompt)
            .bind(&input.enhanced_prompt)
            .bind(&input.model_id)
            .bind(&input.replicate_model)
            .bind(&input.generation_input)
            .bind(&input.media_type)
            .bind(&input.status)
            .bind(&input.status_message)
            .bind(input.progress)
            .bind(&input.face_swap_input_image)
            .bind(&input.replicate_prediction_id)
            .bind(PENDING_MEDIA_URL)
            .fetch_one(pool)
            .await
    }

    /// Find a record by its id.
    pub async fn find_by_id(pool: &PgPool, id: HistoryId) -> Result<Option<HistoryRecord>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM creation_history WHERE id = $1");
        sqlx::query_as::<_, HistoryRecord>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find the most recent record whose `kind` prediction column matches.
    pub async fn find_by_prediction(
        pool: &PgPool,
        prediction_id: &str,
        kind: JobKind,
    ) -> Result<Option<HistoryRecord>, sqlx::Error> {
        let column = prediction_column(kind);
        let query = format!(
            "SELECT {COLUMNS} FROM creation_history \
             WHERE {column} = $1 \
             ORDER BY created_at DESC \
             LIMIT 1"
        );
        sqlx::query_as::<_, HistoryRecord>(&query)
            .bind(prediction_id)
            .fetch_optional(pool)
            .await
    }

    /// Apply a partial update by record id.
    pub async fn update_by_id(
        pool: &PgPool,
        id: HistoryId,
        input: &UpdateHistory,
    ) -> Result<Option<HistoryRecord>, sqlx::Error> {
        let query = format!(
            "UPDATE creation_history SET {UPDATE_SET}, {UPDATE_KEYS} \
             WHERE id = $1 RETURNING {COLUMNS}"
        );
        bind_update(sqlx::query_as::<_, HistoryRecord>(&query).bind(id), input)
            .bind(input.replicate_prediction_id.as_deref())
            .bind(input.face_swap_prediction_id.as_deref())
            .fetch_optional(pool)
            .await
    }

    /// Apply a partial update to every record whose `kind` prediction column matches.
    pub async fn update_by_prediction(
        pool: &PgPool,
        prediction_id: &str,
        kind: JobKind,
        input: &UpdateHistory,
    ) -> Result<Vec<HistoryRecord>, sqlx::Error> {
        let column = prediction_column(kind);
        let query = format!(
            "UPDATE creation_history SET {UPDATE_SET}, {UPDATE_KEYS} \
             WHERE {column} = $1 RETURNING {COLUMNS}"
        );
        bind_update(sqlx::query_as::<_, HistoryRecord>(&query).bind(prediction_id), input)
            .bind(input.replicate_prediction_id.as_deref())
            .bind(input.face_swap_prediction_id.as_deref())
            .fetch_all(pool)
            .await
    }

    /// Point the record at a new active job, but only if `expected` is still
    /// the active key.
    ///
    /// The new id is written to the column for `kind`; the non-key fields of
    /// `input` are applied as a partial update. Returns `None` when another
    /// poll already moved the key.
    pub async fn switch_active_prediction(
        pool: &PgPool,
        id: HistoryId,
        expected: &str,
        new_prediction_id: &str,
        kind: JobKind,
        input: &UpdateHistory,
    ) -> Result<Option<HistoryRecord>, sqlx::Error> {
        let column = prediction_column(kind);
        let query = format!(
            "UPDATE creation_history SET {UPDATE_SET}, {column} = $11 \
             WHERE id = $1 \
               AND COALESCE(face_swap_prediction_id, replicate_prediction_id) = $12 \
             RETURNING {COLUMNS}"
        );
        bind_update(sqlx::query_as::<_, HistoryRecord>(&query).bind(id), input)
            .bind(new_prediction_id)
            .bind(expected)
            .fetch_optional(pool)
            .await
    }

    /// Record the persisted media URL and flip `saved_to_storage`.
    ///
    /// Returns `false` if the record was already saved with a real URL, in
    /// which case nothing is written.
    pub async fn mark_saved(pool: &PgPool, id: HistoryId, media_url: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE creation_history \
             SET saved_to_storage = TRUE, media_url = $2, updated_at = NOW() \
             WHERE id = $1 \
               AND (saved_to_storage = FALSE OR media_url IS NULL OR media_url = $3)",
        )
        .bind(id)
        .bind(media_url)
        .bind(PENDING_MEDIA_URL)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// List a user's records, newest first.
    pub async fn list_by_user(
        pool: &PgPool,
        user_id: UserId,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<HistoryRecord>, sqlx::Error> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = offset.unwrap_or(0).max(0);

        let query = format!(
            "SELECT {COLUMNS} FROM creation_history \
             WHERE user_id = $1 \
             ORDER BY created_at DESC \
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, HistoryRecord>(&query)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }
}

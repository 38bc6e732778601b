//! History Recorder: the persisted side channel of the orchestrator.
//!
//! [`HistoryStore`] is the storage seam (PostgreSQL in production, in-memory
//! in tests). [`HistoryRecorder`] wraps it for the orchestrator and never
//! returns store errors: every failure is logged with the correlating ids
//! and turned into a neutral value.

use std::sync::Arc;

use async_trait::async_trait;
use visionary_core::job::JobKind;
use visionary_core::types::{HistoryId, UserId};
use visionary_db::models::history::{CreateHistory, HistoryRecord, UpdateHistory};
use visionary_db::repositories::{HistoryRepo, ProcessingMetadataRepo};
use visionary_db::DbPool;

/// How a history record is addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryKey {
    Id(HistoryId),
    /// A job id, matched against the column for `kind`.
    Prediction { id: String, kind: JobKind },
}

impl std::fmt::Display for HistoryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "history:{id}"),
            Self::Prediction { id, kind } => write!(f, "{}:{id}", kind.label()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HistoryStoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("History store unavailable: {0}")]
    Unavailable(String),
}

/// Persistence operations for history records and per-job metadata.
#[async_trait]
pub trait HistoryStore: Send + Sync + 'static {
    async fn create(&self, input: &CreateHistory) -> Result<HistoryRecord, HistoryStoreError>;

    async fn find(&self, key: &HistoryKey) -> Result<Option<HistoryRecord>, HistoryStoreError>;

    /// Partial update. Returns the first updated record, if any matched.
    async fn update(&self, key: &HistoryKey, input: &UpdateHistory) -> Result<Option<HistoryRecord>, HistoryStoreError>;

    /// Compare-and-set of the active polling key. `None` when `expected` is
    /// no longer the active key.
    async fn switch_active_prediction(
        &self,
        id: HistoryId,
        expected: &str,
        new_prediction_id: &str,
        kind: JobKind,
        input: &UpdateHistory,
    ) -> Result<Option<HistoryRecord>, HistoryStoreError>;

    /// Flip the save flag false -> true. `false` when already saved.
    async fn mark_saved(&self, id: HistoryId, media_url: &str) -> Result<bool, HistoryStoreError>;

    /// Whether a cancellation was already attempted for the job.
    async fn cancellation_attempted(&self, prediction_id: &str) -> Result<bool, HistoryStoreError>;

    /// Flip the cancellation flag false -> true. `false` when already set.
    async fn mark_cancellation_attempted(&self, prediction_id: &str) -> Result<bool, HistoryStoreError>;

    /// Flip the cancellation flag true -> false. `false` when not set.
    async fn release_cancellation(&self, prediction_id: &str) -> Result<bool, HistoryStoreError>;

    async fn list_by_user(
        &self,
        user_id: UserId,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<HistoryRecord>, HistoryStoreError>;
}

/// [`HistoryStore`] backed by the `creation_history` and
/// `processing_metadata` tables.
#[derive(Clone)]
pub struct PgHistoryStore {
    pool: DbPool,
}

impl PgHistoryStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HistoryStore for PgHistoryStore {
    async fn create(&self, input: &CreateHistory) -> Result<HistoryRecord, HistoryStoreError> {
        Ok(HistoryRepo::upsert(&self.pool, input).await?)
    }

    async fn find(&self, key: &HistoryKey) -> Result<Option<HistoryRecord>, HistoryStoreError> {
        let record = match key {
            HistoryKey::Id(id) => HistoryRepo::find_by_id(&self.pool, *id).await?,
            HistoryKey::Prediction { id, kind } => HistoryRepo::find_by_prediction(&self.pool, id, *kind).await?,
        };
        Ok(record)
    }

    async fn update(&self, key: &HistoryKey, input: &UpdateHistory) -> Result<Option<HistoryRecord>, HistoryStoreError> {
        let record = match key {
            HistoryKey::Id(id) => HistoryRepo::update_by_id(&self.pool, *id, input).await?,
            HistoryKey::Prediction { id, kind } => HistoryRepo::update_by_prediction(&self.pool, id, *kind, input)
                .await?
                .into_iter()
                .next(),
        };
        Ok(record)
    }

    async fn switch_active_prediction(
        &self,
        id: HistoryId,
        expected: &str,
        new_prediction_id: &str,
        kind: JobKind,
        input: &UpdateHistory,
    ) -> Result<Option<HistoryRecord>, HistoryStoreError> {
        Ok(HistoryRepo::switch_active_prediction(&self.pool, id, expected, new_prediction_id, kind, input).await?)
    }

    async fn mark_saved(&self, id: HistoryId, media_url: &str) -> Result<bool, HistoryStoreError> {
        Ok(HistoryRepo::mark_saved(&self.pool, id, media_url).await?)
    }

    async fn cancellation_attempted(&self, prediction_id: &str) -> Result<bool, HistoryStoreError> {
        let meta = ProcessingMetadataRepo::find_or_create(&self.pool, prediction_id).await?;
        Ok(meta.cancellation_attempted)
    }

    async fn mark_cancellation_attempted(&self, prediction_id: &str) -> Result<bool, HistoryStoreError> {
        Ok(ProcessingMetadataRepo::mark_cancellation_attempted(&self.pool, prediction_id).await?)
    }

    async fn release_cancellation(&self, prediction_id: &str) -> Result<bool, HistoryStoreError> {
        Ok(ProcessingMetadataRepo::release_cancellation(&self.pool, prediction_id).await?)
    }

    async fn list_by_user(
        &self,
        user_id: UserId,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<HistoryRecord>, HistoryStoreError> {
        Ok(HistoryRepo::list_by_user(&self.pool, user_id, limit, offset).await?)
    }
}

/// Outcome of a compare-and-set on the active polling key.
#[derive(Debug, Clone)]
pub enum SwitchOutcome {
    Switched(HistoryRecord),
    /// Another poll moved the key first; `active` is the key it holds now.
    Lost { active: Option<String> },
    /// The store failed; the switch state is unknown.
    Unavailable,
}

/// Error-swallowing front of a [`HistoryStore`].
#[derive(Clone)]
pub struct HistoryRecorder {
    store: Arc<dyn HistoryStore>,
}

impl HistoryRecorder {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self { store }
    }

    /// Insert a new record. `None` if the store failed.
    pub async fn create(&self, input: &CreateHistory) -> Option<HistoryRecord> {
        match self.store.create(input).await {
            Ok(record) => {
                tracing::debug!(history_id = %record.id, "History record created");
                Some(record)
            }
            Err(e) => {
                tracing::error!(
                    history_id = %input.id,
                    prediction_id = input.replicate_prediction_id.as_deref().unwrap_or_default(),
                    error = %e,
                    "Failed to create history record",
                );
                None
            }
        }
    }

    pub async fn load(&self, key: &HistoryKey) -> Option<HistoryRecord> {
        match self.store.find(key).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to load history record");
                None
            }
        }
    }

    /// Apply a partial update. Missing records and store failures are logged.
    pub async fn upsert(&self, key: &HistoryKey, fields: &UpdateHistory) -> Option<HistoryRecord> {
        match self.store.update(key, fields).await {
            Ok(Some(record)) => Some(record),
            Ok(None) => {
                tracing::warn!(key = %key, status = ?fields.status, "No history record matched update");
                None
            }
            Err(e) => {
                tracing::error!(key = %key, status = ?fields.status, error = %e, "Failed to update history record");
                None
            }
        }
    }

    pub async fn switch_active(
        &self,
        id: HistoryId,
        expected: &str,
        new_prediction_id: &str,
        kind: JobKind,
        fields: &UpdateHistory,
    ) -> SwitchOutcome {
        match self
            .store
            .switch_active_prediction(id, expected, new_prediction_id, kind, fields)
            .await
        {
            Ok(Some(record)) => SwitchOutcome::Switched(record),
            Ok(None) => {
                let active = self
                    .load(&HistoryKey::Id(id))
                    .await
                    .and_then(|r| r.active_prediction_id().map(str::to_string));
                tracing::info!(
                    history_id = %id,
                    prediction_id = expected,
                    active = active.as_deref().unwrap_or_default(),
                    "Active polling key already moved",
                );
                SwitchOutcome::Lost { active }
            }
            Err(e) => {
                tracing::error!(
                    history_id = %id,
                    prediction_id = expected,
                    new_prediction_id,
                    error = %e,
                    "Failed to switch active polling key",
                );
                SwitchOutcome::Unavailable
            }
        }
    }

    /// Claim the save of a persisted result. A store failure counts as a
    /// successful claim so the caller can still report the URL.
    pub async fn claim_save(&self, id: HistoryId, media_url: &str) -> bool {
        match self.store.mark_saved(id, media_url).await {
            Ok(flipped) => flipped,
            Err(e) => {
                tracing::error!(history_id = %id, error = %e, "Failed to set save flag");
                true
            }
        }
    }

    pub async fn cancellation_attempted(&self, prediction_id: &str) -> bool {
        match self.store.cancellation_attempted(prediction_id).await {
            Ok(attempted) => attempted,
            Err(e) => {
                tracing::warn!(prediction_id, error = %e, "Failed to read processing metadata");
                false
            }
        }
    }

    /// Claim the single cancellation of a stuck job. A store failure counts
    /// as a lost claim, so no cancel is sent without the guard.
    pub async fn claim_cancellation(&self, prediction_id: &str) -> bool {
        match self.store.mark_cancellation_attempted(prediction_id).await {
            Ok(flipped) => flipped,
            Err(e) => {
                tracing::error!(prediction_id, error = %e, "Failed to record cancellation attempt");
                false
            }
        }
    }

    /// Give back a cancellation claim whose cancel never reached the
    /// provider, so a later poll can try again.
    pub async fn release_cancellation(&self, prediction_id: &str) {
        if let Err(e) = self.store.release_cancellation(prediction_id).await {
            tracing::error!(prediction_id, error = %e, "Failed to release cancellation attempt");
        }
    }
}

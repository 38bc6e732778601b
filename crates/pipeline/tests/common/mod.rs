//! In-memory fakes of the pipeline's four service seams.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::Barrier;
use uuid::Uuid;
use visionary_core::job::{JobKind, JobStatus};
use visionary_core::types::{HistoryId, Timestamp, UserId};
use visionary_db::models::history::{CreateHistory, HistoryRecord, UpdateHistory, PENDING_MEDIA_URL};
use visionary_pipeline::recorder::{HistoryKey, HistoryStore, HistoryStoreError};
use visionary_pipeline::{PipelineConfig, PipelineContext};
use visionary_replicate::{InferenceApi, Prediction, ReplicateApiError};
use visionary_storage::{FetchError, FetchedMedia, MediaFetcher, ObjectStorage, StorageError};

pub const STORAGE_BASE: &str = "https://storage.test";

pub fn prediction(id: &str, status: JobStatus, output: Option<Value>) -> Prediction {
    Prediction {
        id: id.to_string(),
        status,
        output,
        error: None,
        created_at: Some(Utc::now()),
    }
}

pub fn failed_prediction(id: &str, error: &str) -> Prediction {
    Prediction {
        error: Some(Value::String(error.to_string())),
        ..prediction(id, JobStatus::Failed, None)
    }
}

pub fn stuck_prediction(id: &str, minutes_ago: i64) -> Prediction {
    Prediction {
        created_at: Some(Utc::now() - chrono::Duration::minutes(minutes_ago)),
        ..prediction(id, JobStatus::Starting, None)
    }
}

// ---------------------------------------------------------------------------
// Inference
// ---------------------------------------------------------------------------

/// Scripted inference provider. Each `get` pops the next scripted
/// prediction for the id; the last one repeats.
#[derive(Default)]
pub struct FakeInference {
    scripts: Mutex<HashMap<String, VecDeque<Prediction>>>,
    pub submissions: Mutex<Vec<(String, String, Value)>>,
    pub cancels: Mutex<Vec<String>>,
    pub gets: AtomicUsize,
    next_id: AtomicUsize,
    pub fail_submit: AtomicBool,
    pub fail_cancel: AtomicBool,
    pub fail_get: AtomicBool,
}

impl FakeInference {
    pub fn script(&self, id: &str, predictions: Vec<Prediction>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(id.to_string(), predictions.into());
    }

    pub fn submitted_models(&self) -> Vec<String> {
        self.submissions
            .lock()
            .unwrap()
            .iter()
            .map(|(_, model, _)| model.clone())
            .collect()
    }

    pub fn last_submission(&self) -> Option<(String, String, Value)> {
        self.submissions.lock().unwrap().last().cloned()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.cancels.lock().unwrap().clone()
    }
}

#[async_trait]
impl InferenceApi for FakeInference {
    async fn submit(&self, model: &str, input: &Value) -> Result<Prediction, ReplicateApiError> {
        if self.fail_submit.load(Ordering::SeqCst) {
            return Err(ReplicateApiError::ApiError {
                status: 422,
                body: "invalid input".into(),
            });
        }
        let id = format!("job-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.submissions
            .lock()
            .unwrap()
            .push((id.clone(), model.to_string(), input.clone()));
        Ok(prediction(&id, JobStatus::Starting, None))
    }

    async fn get(&self, prediction_id: &str) -> Result<Prediction, ReplicateApiError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(ReplicateApiError::ApiError {
                status: 503,
                body: "unavailable".into(),
            });
        }
        let mut scripts = self.scripts.lock().unwrap();
        let queue = scripts.get_mut(prediction_id).ok_or_else(|| ReplicateApiError::ApiError {
            status: 404,
            body: format!("no prediction {prediction_id}"),
        })?;
        let next = if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().unwrap()
        };
        Ok(next)
    }

    async fn cancel(&self, prediction_id: &str) -> Result<(), ReplicateApiError> {
        if self.fail_cancel.load(Ordering::SeqCst) {
            return Err(ReplicateApiError::ApiError {
                status: 500,
                body: "cancel failed".into(),
            });
        }
        self.cancels.lock().unwrap().push(prediction_id.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Object storage
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeStorage {
    /// `(bucket, path, size, content_type)` per upload.
    pub uploads: Mutex<Vec<(String, String, usize, String)>>,
    /// `(bucket, path, ttl)` per signing request.
    pub sign_requests: Mutex<Vec<(String, String, u64)>>,
    pub fail_sign: AtomicBool,
    pub fail_upload: AtomicBool,
}

impl FakeStorage {
    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn upload(&self, bucket: &str, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, StorageError> {
        if self.fail_upload.load(Ordering::SeqCst) {
            return Err(StorageError::ApiError {
                status: 500,
                body: "disk full".into(),
            });
        }
        self.uploads
            .lock()
            .unwrap()
            .push((bucket.into(), path.into(), bytes.len(), content_type.into()));
        Ok(path.to_string())
    }

    async fn create_signed_url(&self, bucket: &str, path: &str, ttl_secs: u64) -> Result<String, StorageError> {
        self.sign_requests
            .lock()
            .unwrap()
            .push((bucket.into(), path.into(), ttl_secs));
        if self.fail_sign.load(Ordering::SeqCst) {
            return Err(StorageError::ApiError {
                status: 400,
                body: "Object not found".into(),
            });
        }
        Ok(format!("{STORAGE_BASE}/storage/v1/object/sign/{bucket}/{path}?token=t{ttl_secs}"))
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{STORAGE_BASE}/storage/v1/object/public/{bucket}/{path}")
    }
}

// ---------------------------------------------------------------------------
// Media fetcher
// ---------------------------------------------------------------------------

/// Serves `media-bytes` as PNG for every URL unless told otherwise.
pub struct FakeFetcher {
    pub probe_status: Mutex<u16>,
    pub unreachable: Mutex<Vec<String>>,
    pub fetches: Mutex<Vec<String>>,
    pub probes: Mutex<Vec<String>>,
    /// When set, every fetch waits here before returning.
    gate: Mutex<Option<Arc<Barrier>>>,
}

impl Default for FakeFetcher {
    fn default() -> Self {
        Self {
            probe_status: Mutex::new(200),
            unreachable: Mutex::new(Vec::new()),
            fetches: Mutex::new(Vec::new()),
            probes: Mutex::new(Vec::new()),
            gate: Mutex::new(None),
        }
    }
}

impl FakeFetcher {
    pub fn set_probe_status(&self, status: u16) {
        *self.probe_status.lock().unwrap() = status;
    }

    /// Make fetches of URLs starting with `prefix` fail with 404.
    pub fn make_unreachable(&self, prefix: &str) {
        self.unreachable.lock().unwrap().push(prefix.to_string());
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetches.lock().unwrap().clone()
    }

    /// Hold fetches until `parties` of them are in flight at once.
    pub fn gate_fetches(&self, parties: usize) {
        *self.gate.lock().unwrap() = Some(Arc::new(Barrier::new(parties)));
    }
}

#[async_trait]
impl MediaFetcher for FakeFetcher {
    async fn probe(&self, url: &str, _timeout: Duration) -> Result<u16, FetchError> {
        self.probes.lock().unwrap().push(url.to_string());
        Ok(*self.probe_status.lock().unwrap())
    }

    async fn fetch(&self, url: &str, _timeout: Duration) -> Result<FetchedMedia, FetchError> {
        self.fetches.lock().unwrap().push(url.to_string());
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.wait().await;
        }
        if self
            .unreachable
            .lock()
            .unwrap()
            .iter()
            .any(|prefix| url.starts_with(prefix.as_str()))
        {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            });
        }
        Ok(FetchedMedia {
            bytes: b"media-bytes".to_vec(),
            content_type: "image/png".into(),
        })
    }
}

// ---------------------------------------------------------------------------
// History store
// ---------------------------------------------------------------------------

/// History store with the same compare-and-set semantics as the SQL one.
#[derive(Default)]
pub struct MemoryHistory {
    records: Mutex<HashMap<HistoryId, HistoryRecord>>,
    cancellations: Mutex<HashMap<String, bool>>,
    pub fail_all: AtomicBool,
}

impl MemoryHistory {
    pub fn get(&self, id: HistoryId) -> HistoryRecord {
        self.records.lock().unwrap().get(&id).cloned().expect("record exists")
    }

    pub fn cancellation_flag(&self, prediction_id: &str) -> Option<bool> {
        self.cancellations.lock().unwrap().get(prediction_id).copied()
    }

    pub fn set_cancellation_flag(&self, prediction_id: &str, attempted: bool) {
        self.cancellations
            .lock()
            .unwrap()
            .insert(prediction_id.to_string(), attempted);
    }

    fn check(&self) -> Result<(), HistoryStoreError> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(HistoryStoreError::Unavailable("connection refused".into()));
        }
        Ok(())
    }

    fn matches(record: &HistoryRecord, key: &HistoryKey) -> bool {
        match key {
            HistoryKey::Id(id) => record.id == *id,
            HistoryKey::Prediction { id, kind } => {
                let column = match kind {
                    JobKind::BaseGeneration => &record.replicate_prediction_id,
                    JobKind::FaceSwap => &record.face_swap_prediction_id,
                };
                column.as_deref() == Some(id.as_str())
            }
        }
    }
}

fn apply(record: &mut HistoryRecord, input: &UpdateHistory) {
    if let Some(v) = &input.status {
        record.status = v.clone();
    }
    if let Some(v) = &input.status_message {
        record.status_message = Some(v.clone());
    }
    if let Some(v) = input.progress {
        record.progress = v;
    }
    if let Some(v) = &input.media_url {
        record.media_url = Some(v.clone());
    }
    if let Some(v) = &input.original_url {
        record.original_url = Some(v.clone());
    }
    if let Some(v) = &input.base_media_url {
        record.base_media_url = Some(v.clone());
    }
    if let Some(v) = &input.error_message {
        record.error_message = Some(v.clone());
    }
    if let Some(v) = input.face_swap_restarted {
        record.face_swap_restarted = v;
    }
    if input.completed {
        record.completed_at = Some(Utc::now());
    }
    record.updated_at = Utc::now();
}

#[async_trait]
impl HistoryStore for MemoryHistory {
    async fn create(&self, input: &CreateHistory) -> Result<HistoryRecord, HistoryStoreError> {
        self.check()?;
        let now: Timestamp = Utc::now();
        let record = HistoryRecord {
            id: input.id,
            user_id: input.user_id,
            original_prompt: input.original_prompt.clone(),
            enhanced_prompt: input.enhanced_prompt.clone(),
            model_id: input.model_id.clone(),
            replicate_model: input.replicate_model.clone(),
            generation_input: input.generation_input.clone(),
            media_type: input.media_type.clone(),
            status: input.status.clone(),
            status_message: input.status_message.clone(),
            progress: input.progress,
            media_url: Some(PENDING_MEDIA_URL.to_string()),
            original_url: None,
            base_media_url: None,
            face_swap_input_image: input.face_swap_input_image.clone(),
            replicate_prediction_id: input.replicate_prediction_id.clone(),
            face_swap_prediction_id: None,
            face_swap_restarted: false,
            saved_to_storage: false,
            error_message: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        self.records.lock().unwrap().insert(record.id, record.clone());
        Ok(record)
    }

    async fn find(&self, key: &HistoryKey) -> Result<Option<HistoryRecord>, HistoryStoreError> {
        self.check()?;
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .find(|r| Self::matches(r, key))
            .cloned())
    }

    async fn update(&self, key: &HistoryKey, input: &UpdateHistory) -> Result<Option<HistoryRecord>, HistoryStoreError> {
        self.check()?;
        let mut records = self.records.lock().unwrap();
        let Some(record) = records.values_mut().find(|r| Self::matches(r, key)) else {
            return Ok(None);
        };
        apply(record, input);
        if let Some(v) = &input.replicate_prediction_id {
            record.replicate_prediction_id = Some(v.clone());
        }
        if let Some(v) = &input.face_swap_prediction_id {
            record.face_swap_prediction_id = Some(v.clone());
        }
        Ok(Some(record.clone()))
    }

    async fn switch_active_prediction(
        &self,
        id: HistoryId,
        expected: &str,
        new_prediction_id: &str,
        kind: JobKind,
        input: &UpdateHistory,
    ) -> Result<Option<HistoryRecord>, HistoryStoreError> {
        self.check()?;
        let mut records = self.records.lock().unwrap();
        let Some(record) = records.get_mut(&id) else {
            return Ok(None);
        };
        if record.active_prediction_id() != Some(expected) {
            return Ok(None);
        }
        apply(record, input);
        match kind {
            JobKind::BaseGeneration => record.replicate_prediction_id = Some(new_prediction_id.to_string()),
            JobKind::FaceSwap => record.face_swap_prediction_id = Some(new_prediction_id.to_string()),
        }
        Ok(Some(record.clone()))
    }

    async fn mark_saved(&self, id: HistoryId, media_url: &str) -> Result<bool, HistoryStoreError> {
        self.check()?;
        let mut records = self.records.lock().unwrap();
        let Some(record) = records.get_mut(&id) else {
            return Ok(false);
        };
        if record.saved_media_url().is_some() {
            return Ok(false);
        }
        record.saved_to_storage = true;
        record.media_url = Some(media_url.to_string());
        Ok(true)
    }

    async fn cancellation_attempted(&self, prediction_id: &str) -> Result<bool, HistoryStoreError> {
        self.check()?;
        Ok(*self
            .cancellations
            .lock()
            .unwrap()
            .entry(prediction_id.to_string())
            .or_insert(false))
    }

    async fn mark_cancellation_attempted(&self, prediction_id: &str) -> Result<bool, HistoryStoreError> {
        self.check()?;
        let mut flags = self.cancellations.lock().unwrap();
        let flag = flags.entry(prediction_id.to_string()).or_insert(false);
        if *flag {
            return Ok(false);
        }
        *flag = true;
        Ok(true)
    }

    async fn release_cancellation(&self, prediction_id: &str) -> Result<bool, HistoryStoreError> {
        self.check()?;
        let mut flags = self.cancellations.lock().unwrap();
        match flags.get_mut(prediction_id) {
            Some(flag) if *flag => {
                *flag = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_by_user(
        &self,
        user_id: UserId,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<HistoryRecord>, HistoryStoreError> {
        self.check()?;
        let mut rows: Vec<_> = self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.user_id == Some(user_id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let offset = offset.unwrap_or(0).max(0) as usize;
        let limit = limit.unwrap_or(20).clamp(1, 100) as usize;
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub inference: Arc<FakeInference>,
    pub storage: Arc<FakeStorage>,
    pub fetcher: Arc<FakeFetcher>,
    pub history: Arc<MemoryHistory>,
    pub ctx: PipelineContext,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(PipelineConfig::default())
    }

    pub fn with_config(config: PipelineConfig) -> Self {
        let inference = Arc::new(FakeInference::default());
        let storage = Arc::new(FakeStorage::default());
        let fetcher = Arc::new(FakeFetcher::default());
        let history = Arc::new(MemoryHistory::default());
        let ctx = PipelineContext::new(
            inference.clone(),
            storage.clone(),
            fetcher.clone(),
            history.clone(),
            config,
        );
        Self {
            inference,
            storage,
            fetcher,
            history,
            ctx,
        }
    }

    /// Insert a record whose active key is `prediction_id`.
    pub async fn seed_record(&self, prediction_id: &str, face_swap_image: Option<&str>) -> HistoryId {
        let id = Uuid::new_v4();
        self.history
            .create(&CreateHistory {
                id,
                user_id: Some(Uuid::new_v4()),
                original_prompt: Some("a castle in the clouds".into()),
                model_id: Some("flux-schnell".into()),
                replicate_model: Some("black-forest-labs/flux-schnell".into()),
                generation_input: Some(serde_json::json!({ "prompt": "a castle in the clouds" })),
                media_type: Some("image".into()),
                status: "processing".into(),
                progress: 15,
                face_swap_input_image: face_swap_image.map(str::to_string),
                replicate_prediction_id: Some(prediction_id.to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        id
    }
}

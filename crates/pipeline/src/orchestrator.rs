//! Status poller / orchestrator.
//!
//! One [`Orchestrator::poll`] call observes the active job of a
//! visualization once, feeds the observation into the lifecycle state
//! machine and performs the side effect it asks for: progress reporting,
//! stuck-job restart, face-swap submission, result persistence or terminal
//! bookkeeping. History writes are best effort; only a failure to reach the
//! provider at all is returned as an error.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use visionary_core::job::{stuck_elapsed, JobKind, JobStatus};
use visionary_core::lifecycle::{on_poll, status_message, Action, Observation, VisualizationState};
use visionary_core::output::{extract_output_url, ExtractionError};
use visionary_core::progress::{self, estimate, restart_floor};
use visionary_core::storage_url::{media_extension, result_object_path, with_download_marker};
use visionary_core::types::HistoryId;
use visionary_db::models::history::{HistoryRecord, UpdateHistory, PENDING_MEDIA_URL};
use visionary_replicate::Prediction;

use crate::config::RESULT_SIGNED_URL_TTL_SECS;
use crate::context::PipelineContext;
use crate::error::PipelineError;
use crate::recorder::{HistoryKey, HistoryRecorder, SwitchOutcome};
use crate::submitter::JobSubmitter;

/// Poll status: the next key is a face-swap job.
pub const STATUS_TRANSITIONING_TO_FACE_SWAP: &str = "transitioning_to_face_swap";

/// Poll status: the next key is a fresh job for the same stage.
pub const STATUS_RESTARTING: &str = "restarting";

const DEFAULT_ERROR: &str = "Unknown error";

/// Body of `POST /visualizations/status`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollRequest {
    pub prediction_id: String,
    #[serde(default)]
    pub history_id: Option<HistoryId>,
    #[serde(default)]
    pub needs_face_swap: bool,
    #[serde(default)]
    pub face_swap_input_image: Option<String>,
    #[serde(default)]
    pub is_face_swap_prediction: bool,
}

/// Result of one poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResponse {
    pub success: bool,
    pub prediction_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_id: Option<HistoryId>,
    pub status: String,
    pub is_face_swap_prediction: bool,
    pub needs_face_swap: bool,
    pub progress: u8,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_result_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_prediction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_likely_stuck: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_minutes: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub face_swap_restarted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_prediction_id: Option<String>,
}

impl PollResponse {
    /// No further polling is needed: the job reached a provider-terminal
    /// state and no follow-up key was handed out.
    pub fn is_final(&self) -> bool {
        self.next_prediction_id.is_none()
            && matches!(self.status.as_str(), "succeeded" | "failed" | "canceled")
    }
}

/// Per-poll context: the request plus what the history store knows.
struct Cycle<'a> {
    req: &'a PollRequest,
    prediction_id: &'a str,
    kind: JobKind,
    history_id: Option<HistoryId>,
    record: Option<HistoryRecord>,
}

impl Cycle<'_> {
    fn key(&self) -> HistoryKey {
        match self.history_id {
            Some(id) => HistoryKey::Id(id),
            None => HistoryKey::Prediction {
                id: self.prediction_id.to_string(),
                kind: self.kind,
            },
        }
    }

    fn previous_progress(&self) -> u8 {
        self.record
            .as_ref()
            .map(|r| r.progress.clamp(0, i16::from(progress::COMPLETE)) as u8)
            .unwrap_or(0)
    }

    fn face_swap_image(&self) -> Option<String> {
        self.req
            .face_swap_input_image
            .clone()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| self.record.as_ref().and_then(|r| r.face_swap_input_image.clone()))
    }

    fn needs_face_swap(&self) -> bool {
        self.req.needs_face_swap
            || self
                .record
                .as_ref()
                .is_some_and(|r| r.face_swap_input_image.is_some())
    }

    /// A face swap follows this (base) job and can actually be submitted.
    fn face_swap_planned(&self) -> bool {
        self.kind == JobKind::BaseGeneration && self.needs_face_swap() && self.face_swap_image().is_some()
    }

    fn response(&self, status: &str, success: bool, progress: u8, message: impl Into<String>) -> PollResponse {
        PollResponse {
            success,
            prediction_id: self.prediction_id.to_string(),
            history_id: self.history_id,
            status: status.to_string(),
            is_face_swap_prediction: self.kind == JobKind::FaceSwap,
            needs_face_swap: self.needs_face_swap(),
            progress,
            message: message.into(),
            ..Default::default()
        }
    }
}

#[derive(Clone)]
pub struct Orchestrator {
    ctx: PipelineContext,
    recorder: HistoryRecorder,
    submitter: JobSubmitter,
}

impl Orchestrator {
    pub fn new(ctx: PipelineContext) -> Self {
        let recorder = ctx.recorder();
        let submitter = ctx.submitter();
        Self {
            ctx,
            recorder,
            submitter,
        }
    }

    /// Observe the active job once and advance the visualization.
    pub async fn poll(&self, req: &PollRequest) -> Result<PollResponse, PipelineError> {
        let prediction_id = req.prediction_id.trim();
        if prediction_id.is_empty() {
            return Err(PipelineError::Validation("predictionId is required".into()));
        }
        let kind = JobKind::from_face_swap_flag(req.is_face_swap_prediction);

        let lookup = match req.history_id {
            Some(id) => HistoryKey::Id(id),
            None => HistoryKey::Prediction {
                id: prediction_id.to_string(),
                kind,
            },
        };
        let record = self.recorder.load(&lookup).await;
        let cycle = Cycle {
            req,
            prediction_id,
            kind,
            history_id: req.history_id.or(record.as_ref().map(|r| r.id)),
            record,
        };

        if let Some(record) = cycle.record.as_ref() {
            if let Some(active) = record.active_prediction_id() {
                if active != prediction_id {
                    return Ok(superseded(&cycle, record, active));
                }
            }
        }

        let state = cycle
            .record
            .as_ref()
            .map(|r| VisualizationState::from_status_str(&r.status))
            .unwrap_or(VisualizationState::Preparing);
        if state.is_terminal() {
            if let Some(record) = cycle.record.as_ref() {
                return Ok(from_terminal_record(&cycle, record, state));
            }
        }

        let prediction = self.ctx.inference.get(prediction_id).await.map_err(|e| {
            tracing::error!(
                history_id = ?cycle.history_id,
                prediction_id,
                stage = kind.label(),
                error = %e,
                "Failed to poll job",
            );
            PipelineError::PollingTransport(e)
        })?;

        let stuck_for = stuck_elapsed(
            prediction.status,
            prediction.created_at,
            Utc::now(),
            self.ctx.config.stuck_threshold_chrono(),
        );
        let stuck = match stuck_for {
            Some(elapsed) => {
                tracing::warn!(
                    history_id = ?cycle.history_id,
                    prediction_id,
                    stage = kind.label(),
                    elapsed_secs = elapsed.num_seconds(),
                    "Job appears stuck in starting",
                );
                !self.recorder.cancellation_attempted(prediction_id).await
            }
            None => false,
        };

        let transition = on_poll(
            state,
            Observation {
                kind,
                status: prediction.status,
                face_swap_requested: cycle.face_swap_planned(),
                stuck,
            },
        );
        tracing::debug!(
            history_id = ?cycle.history_id,
            prediction_id,
            stage = kind.label(),
            status = prediction.status.as_str(),
            action = ?transition.action,
            "Poll observed",
        );

        let response = match transition.action {
            Action::ReportProgress => self.report_progress(&cycle, &prediction, transition.next, stuck_for).await,
            Action::RestartStuckJob => self.restart_stuck(&cycle, &prediction, stuck_for).await,
            Action::StartFaceSwap => self.start_face_swap(&cycle, &prediction).await,
            Action::PersistResult => self.complete(&cycle, &prediction).await,
            Action::RecordFailure | Action::RecordCancellation => {
                self.record_terminal(&cycle, &prediction, transition.next).await
            }
            Action::Ignore => cycle.response(
                prediction.status.as_str(),
                true,
                cycle.previous_progress(),
                status_message(kind, prediction.status),
            ),
        };
        Ok(response)
    }

    // ---------------------------------------------------------------------------
    // Running jobs
    // ---------------------------------------------------------------------------

    async fn report_progress(
        &self,
        cycle: &Cycle<'_>,
        prediction: &Prediction,
        next: VisualizationState,
        stuck_for: Option<chrono::Duration>,
    ) -> PollResponse {
        let progress = estimate(
            cycle.kind,
            prediction.status,
            cycle.previous_progress(),
            cycle.face_swap_planned(),
        );
        let mut response = cycle.response(
            prediction.status.as_str(),
            true,
            progress,
            status_message(cycle.kind, prediction.status),
        );
        if let Some(elapsed) = stuck_for {
            response.is_likely_stuck = Some(true);
            response.elapsed_minutes = Some(minutes(elapsed));
            response.message = stuck_message(cycle.kind);
        }

        self.record(
            cycle,
            UpdateHistory {
                status: Some(next.as_status_str().to_string()),
                status_message: Some(response.message.clone()),
                progress: Some(i16::from(progress)),
                ..Default::default()
            },
        )
        .await;
        response
    }

    async fn restart_stuck(
        &self,
        cycle: &Cycle<'_>,
        prediction: &Prediction,
        stuck_for: Option<chrono::Duration>,
    ) -> PollResponse {
        match self.try_restart(cycle).await {
            Ok(new_id) => {
                tracing::info!(
                    history_id = ?cycle.history_id,
                    prediction_id = cycle.prediction_id,
                    new_prediction_id = %new_id,
                    stage = cycle.kind.label(),
                    "Stuck job restarted",
                );
                let mut response = cycle.response(
                    STATUS_RESTARTING,
                    true,
                    restart_floor(cycle.kind),
                    restarted_message(cycle.kind),
                );
                response.next_prediction_id = Some(new_id.clone());
                response.new_prediction_id = Some(new_id);
                response.face_swap_restarted = Some(true);
                response.is_likely_stuck = Some(true);
                response.elapsed_minutes = stuck_for.map(minutes);
                response
            }
            Err(e) => {
                tracing::warn!(
                    history_id = ?cycle.history_id,
                    prediction_id = cycle.prediction_id,
                    stage = cycle.kind.label(),
                    error = %e,
                    "Stuck job could not be restarted",
                );
                self.report_progress(
                    cycle,
                    prediction,
                    VisualizationState::Starting(cycle.kind),
                    stuck_for,
                )
                .await
            }
        }
    }

    /// Cancel the stuck job once and resubmit the same stage from the
    /// inputs kept on the history record. Returns the new job id.
    async fn try_restart(&self, cycle: &Cycle<'_>) -> Result<String, PipelineError> {
        let stuck = |reason: String| PipelineError::StuckJob {
            prediction_id: cycle.prediction_id.to_string(),
            reason,
        };
        let record = cycle
            .record
            .as_ref()
            .ok_or_else(|| stuck("no history record to restart from".into()))?;

        let resubmit = match cycle.kind {
            JobKind::BaseGeneration => match (&record.replicate_model, &record.generation_input) {
                (Some(model), Some(input)) => Resubmit::Base {
                    model: model.clone(),
                    input: input.clone(),
                },
                _ => return Err(stuck("base inputs missing from history record".into())),
            },
            JobKind::FaceSwap => match (&record.base_media_url, cycle.face_swap_image()) {
                (Some(base), Some(portrait)) => Resubmit::FaceSwap {
                    base: base.clone(),
                    portrait,
                },
                _ => return Err(stuck("face swap inputs missing from history record".into())),
            },
        };

        if !self.recorder.claim_cancellation(cycle.prediction_id).await {
            return Err(stuck("cancellation already attempted".into()));
        }
        if let Err(e) = self.ctx.inference.cancel(cycle.prediction_id).await {
            self.recorder.release_cancellation(cycle.prediction_id).await;
            return Err(stuck(format!("cancel failed: {e}")));
        }

        let handle = match resubmit {
            Resubmit::Base { model, input } => self.submitter.submit_base(&model, &input).await?,
            Resubmit::FaceSwap { base, portrait } => self.submitter.submit_face_swap(&base, &portrait).await?,
        };

        let fields = UpdateHistory {
            status: Some(VisualizationState::Starting(cycle.kind).as_status_str().to_string()),
            status_message: Some(restarted_message(cycle.kind)),
            progress: Some(i16::from(restart_floor(cycle.kind))),
            face_swap_restarted: (cycle.kind == JobKind::FaceSwap).then_some(true),
            ..Default::default()
        };
        match self
            .recorder
            .switch_active(record.id, cycle.prediction_id, &handle.id, cycle.kind, &fields)
            .await
        {
            SwitchOutcome::Switched(_) | SwitchOutcome::Unavailable => Ok(handle.id),
            SwitchOutcome::Lost { .. } => {
                self.cancel_duplicate(&handle.id).await;
                Err(stuck("another poll already restarted the job".into()))
            }
        }
    }

    // ---------------------------------------------------------------------------
    // Succeeded jobs
    // ---------------------------------------------------------------------------

    async fn start_face_swap(&self, cycle: &Cycle<'_>, prediction: &Prediction) -> PollResponse {
        let base_url = match output_url(prediction) {
            Ok(url) => url,
            Err(e) => return self.extraction_failed(cycle, prediction, e).await,
        };
        let Some(portrait) = cycle.face_swap_image() else {
            return self.complete(cycle, prediction).await;
        };

        match self.submitter.submit_face_swap(&base_url, &portrait).await {
            Ok(handle) => {
                let fields = UpdateHistory {
                    status: Some(VisualizationState::Starting(JobKind::FaceSwap).as_status_str().to_string()),
                    status_message: Some("Face swap process started".into()),
                    progress: Some(i16::from(progress::FACE_SWAP_TRANSITION)),
                    base_media_url: Some(base_url.clone()),
                    ..Default::default()
                };
                let next = match cycle.history_id {
                    Some(id) => match self
                        .recorder
                        .switch_active(id, cycle.prediction_id, &handle.id, JobKind::FaceSwap, &fields)
                        .await
                    {
                        SwitchOutcome::Lost { active: Some(active) } => {
                            self.cancel_duplicate(&handle.id).await;
                            active
                        }
                        _ => handle.id,
                    },
                    None => handle.id,
                };

                tracing::info!(
                    history_id = ?cycle.history_id,
                    prediction_id = cycle.prediction_id,
                    face_swap_prediction_id = %next,
                    "Base stage done, face swap started",
                );
                let mut response = cycle.response(
                    STATUS_TRANSITIONING_TO_FACE_SWAP,
                    true,
                    progress::FACE_SWAP_TRANSITION,
                    "Base image generated, starting face swap...",
                );
                response.output_url = Some(base_url.clone());
                response.base_image_url = Some(base_url);
                response.next_prediction_id = Some(next);
                response
            }
            Err(e) => {
                let error = format!("Failed to start face swap: {e}");
                tracing::error!(
                    history_id = ?cycle.history_id,
                    prediction_id = cycle.prediction_id,
                    error = %error,
                    "Face swap submission failed, keeping base result",
                );
                self.record(
                    cycle,
                    UpdateHistory {
                        status: Some(
                            VisualizationState::Succeeded(JobKind::BaseGeneration)
                                .after_face_swap_submission(false)
                                .as_status_str()
                                .to_string(),
                        ),
                        status_message: Some("Base image generated but face swap failed to start".into()),
                        progress: Some(i16::from(progress::COMPLETE)),
                        media_url: Some(base_url.clone()),
                        original_url: Some(base_url.clone()),
                        base_media_url: Some(base_url.clone()),
                        error_message: Some(error.clone()),
                        completed: true,
                        ..Default::default()
                    },
                )
                .await;

                let mut response = cycle.response(
                    prediction.status.as_str(),
                    true,
                    progress::COMPLETE,
                    "Base image generated but face swap failed to start",
                );
                response.output_url = Some(base_url.clone());
                response.base_image_url = Some(base_url.clone());
                response.final_result_url = Some(base_url);
                response.error = Some(error);
                response
            }
        }
    }

    async fn complete(&self, cycle: &Cycle<'_>, prediction: &Prediction) -> PollResponse {
        let output = match output_url(prediction) {
            Ok(url) => url,
            Err(e) => return self.extraction_failed(cycle, prediction, e).await,
        };
        let base_image_url = cycle.record.as_ref().and_then(|r| r.base_media_url.clone());

        match self.persist_result(cycle, &output).await {
            Ok(saved_url) => {
                let message = status_message(cycle.kind, JobStatus::Succeeded);
                self.record(
                    cycle,
                    UpdateHistory {
                        status: Some(
                            VisualizationState::Succeeded(cycle.kind)
                                .after_persist(true)
                                .as_status_str()
                                .to_string(),
                        ),
                        status_message: Some(message.clone()),
                        progress: Some(i16::from(progress::COMPLETE)),
                        media_url: Some(saved_url.clone()),
                        original_url: Some(output.clone()),
                        completed: true,
                        ..Default::default()
                    },
                )
                .await;

                let mut response = cycle.response(prediction.status.as_str(), true, progress::COMPLETE, message);
                response.output_url = Some(output);
                response.base_image_url = base_image_url;
                response.final_result_url = Some(saved_url);
                response
            }
            Err(e) => {
                let message = save_failed_message(cycle.kind);
                tracing::error!(
                    history_id = ?cycle.history_id,
                    prediction_id = cycle.prediction_id,
                    error = %e,
                    "Result not persisted, falling back to provider URL",
                );
                self.record(
                    cycle,
                    UpdateHistory {
                        status: Some(
                            VisualizationState::Succeeded(cycle.kind)
                                .after_persist(false)
                                .as_status_str()
                                .to_string(),
                        ),
                        status_message: Some(message.clone()),
                        progress: Some(i16::from(progress::COMPLETE)),
                        media_url: Some(output.clone()),
                        original_url: Some(output.clone()),
                        error_message: Some(e.to_string()),
                        completed: true,
                        ..Default::default()
                    },
                )
                .await;

                let mut response = cycle.response(prediction.status.as_str(), true, progress::COMPLETE, message);
                response.output_url = Some(output.clone());
                response.base_image_url = base_image_url;
                response.final_result_url = Some(output);
                response.error = Some(e.to_string());
                response
            }
        }
    }

    /// Copy the provider output into permanent storage, at most once per
    /// visualization. Returns the URL to hand to the user.
    async fn persist_result(&self, cycle: &Cycle<'_>, output_url: &str) -> Result<String, PipelineError> {
        if let Some(saved) = cycle.record.as_ref().and_then(HistoryRecord::saved_media_url) {
            tracing::info!(
                history_id = ?cycle.history_id,
                prediction_id = cycle.prediction_id,
                "Result already saved, reusing stored URL",
            );
            return Ok(saved.to_string());
        }

        let config = &self.ctx.config;
        let media = self
            .ctx
            .fetcher
            .fetch(output_url, config.download_timeout)
            .await
            .map_err(|e| PipelineError::PersistenceFailed(format!("download failed: {e}")))?;
        if media.bytes.is_empty() {
            return Err(PipelineError::PersistenceFailed("downloaded result is empty".into()));
        }

        let folder_key = cycle
            .history_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| cycle.prediction_id.to_string());
        let ext = media_extension(Some(&media.content_type), output_url);
        let path = result_object_path(&config.results_folder, &folder_key, cycle.prediction_id, ext);
        let size = media.bytes.len();

        let stored_path = self
            .ctx
            .storage
            .upload(&config.results_bucket, &path, media.bytes, &media.content_type)
            .await
            .map_err(|e| PipelineError::PersistenceFailed(e.to_string()))?;
        tracing::info!(
            history_id = ?cycle.history_id,
            prediction_id = cycle.prediction_id,
            bucket = %config.results_bucket,
            path = %stored_path,
            bytes = size,
            "Result uploaded",
        );

        let url = self.harden_result_url(&stored_path).await;

        if let Some(id) = cycle.history_id {
            if !self.recorder.claim_save(id, &url).await {
                let saved = self
                    .recorder
                    .load(&HistoryKey::Id(id))
                    .await
                    .and_then(|r| r.saved_media_url().map(str::to_string));
                if let Some(saved) = saved {
                    tracing::info!(history_id = %id, "Result saved by a concurrent poll, reusing its URL");
                    return Ok(saved);
                }
            }
        }
        Ok(url)
    }

    /// Public URL with `download=true` if reachable, else a 24-hour signed URL.
    async fn harden_result_url(&self, path: &str) -> String {
        let config = &self.ctx.config;
        let public = with_download_marker(&self.ctx.storage.public_url(&config.results_bucket, path));

        match self.ctx.fetcher.probe(&public, config.probe_timeout).await {
            Ok(status) if (200..300).contains(&status) => return public,
            Ok(status) => tracing::warn!(url = %public, status, "Public result URL not accessible"),
            Err(e) => tracing::warn!(url = %public, error = %e, "Public result URL probe failed"),
        }

        match self
            .ctx
            .storage
            .create_signed_url(&config.results_bucket, path, RESULT_SIGNED_URL_TTL_SECS)
            .await
        {
            Ok(signed) => signed,
            Err(e) => {
                tracing::warn!(path, error = %e, "Signed result URL failed, using public URL");
                public
            }
        }
    }

    // ---------------------------------------------------------------------------
    // Failures
    // ---------------------------------------------------------------------------

    async fn extraction_failed(&self, cycle: &Cycle<'_>, prediction: &Prediction, err: ExtractionError) -> PollResponse {
        let err = PipelineError::from(err);
        tracing::error!(
            history_id = ?cycle.history_id,
            prediction_id = cycle.prediction_id,
            stage = cycle.kind.label(),
            error = %err,
            "Job succeeded without a usable output",
        );
        let message = "Job finished but returned no usable output";
        self.record(
            cycle,
            UpdateHistory {
                status: Some(VisualizationState::CompletedWithError.as_status_str().to_string()),
                status_message: Some(message.into()),
                error_message: Some(err.to_string()),
                completed: true,
                ..Default::default()
            },
        )
        .await;

        let mut response = cycle.response(prediction.status.as_str(), false, cycle.previous_progress(), message);
        response.error = Some(err.to_string());
        response
    }

    /// Failed and canceled jobs keep their last progress.
    async fn record_terminal(&self, cycle: &Cycle<'_>, prediction: &Prediction, next: VisualizationState) -> PollResponse {
        let message = status_message(cycle.kind, prediction.status);
        let error = match next {
            VisualizationState::Failed => Some(prediction.error_message().unwrap_or_else(|| DEFAULT_ERROR.into())),
            _ => prediction.error_message(),
        };
        tracing::warn!(
            history_id = ?cycle.history_id,
            prediction_id = cycle.prediction_id,
            stage = cycle.kind.label(),
            status = prediction.status.as_str(),
            error = error.as_deref().unwrap_or_default(),
            "Job ended without a result",
        );

        self.record(
            cycle,
            UpdateHistory {
                status: Some(next.as_status_str().to_string()),
                status_message: Some(message.clone()),
                error_message: error.clone(),
                completed: true,
                ..Default::default()
            },
        )
        .await;

        let mut response = cycle.response(prediction.status.as_str(), false, cycle.previous_progress(), message);
        response.error = error;
        response
    }

    // ---------------------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------------------

    async fn record(&self, cycle: &Cycle<'_>, fields: UpdateHistory) {
        if cycle.record.is_none() && cycle.history_id.is_none() {
            tracing::debug!(prediction_id = cycle.prediction_id, "No history record for job, skipping update");
            return;
        }
        self.recorder.upsert(&cycle.key(), &fields).await;
    }

    async fn cancel_duplicate(&self, prediction_id: &str) {
        if let Err(e) = self.ctx.inference.cancel(prediction_id).await {
            tracing::warn!(prediction_id, error = %e, "Failed to cancel duplicate job");
        }
    }
}

enum Resubmit {
    Base { model: String, input: Value },
    FaceSwap { base: String, portrait: String },
}

fn output_url(prediction: &Prediction) -> Result<String, ExtractionError> {
    extract_output_url(prediction.output.as_ref().unwrap_or(&Value::Null))
}

/// Answer for a poll on a key that is no longer active. Nothing is written.
fn superseded(cycle: &Cycle<'_>, record: &HistoryRecord, active: &str) -> PollResponse {
    let to_face_swap =
        cycle.kind == JobKind::BaseGeneration && record.face_swap_prediction_id.as_deref() == Some(active);
    let status = if to_face_swap {
        STATUS_TRANSITIONING_TO_FACE_SWAP
    } else {
        STATUS_RESTARTING
    };
    tracing::debug!(
        history_id = %record.id,
        prediction_id = cycle.prediction_id,
        active,
        "Poll for superseded job",
    );

    let mut response = cycle.response(
        status,
        true,
        cycle.previous_progress(),
        record
            .status_message
            .clone()
            .unwrap_or_else(|| "Job superseded".into()),
    );
    response.base_image_url = record.base_media_url.clone();
    response.next_prediction_id = Some(active.to_string());
    response
}

/// Answer from a record that already reached a terminal state, without
/// asking the provider again.
fn from_terminal_record(cycle: &Cycle<'_>, record: &HistoryRecord, state: VisualizationState) -> PollResponse {
    let status = match state {
        VisualizationState::Failed => JobStatus::Failed,
        VisualizationState::Canceled => JobStatus::Canceled,
        _ => JobStatus::Succeeded,
    };
    let final_url = record.media_url.clone().filter(|u| u != PENDING_MEDIA_URL);
    let success = status == JobStatus::Succeeded && final_url.is_some();

    let mut response = cycle.response(
        status.as_str(),
        success,
        cycle.previous_progress(),
        record
            .status_message
            .clone()
            .unwrap_or_else(|| status_message(cycle.kind, status)),
    );
    response.output_url = record.original_url.clone();
    response.base_image_url = record.base_media_url.clone();
    response.final_result_url = final_url;
    response.error = record.error_message.clone();
    response
}

fn stage_label(kind: JobKind) -> &'static str {
    match kind {
        JobKind::BaseGeneration => "Dream generation",
        JobKind::FaceSwap => "Face swap",
    }
}

fn stuck_message(kind: JobKind) -> String {
    format!(
        "{} appears to be stuck in the starting phase. This may indicate image access issues.",
        stage_label(kind)
    )
}

fn restarted_message(kind: JobKind) -> String {
    format!(
        "{} was stuck in starting state and has been automatically restarted.",
        stage_label(kind)
    )
}

fn save_failed_message(kind: JobKind) -> String {
    match kind {
        JobKind::BaseGeneration => "Dream generated but failed to save result".into(),
        JobKind::FaceSwap => "Face swap completed but failed to save result".into(),
    }
}

/// Whole minutes with one decimal.
fn minutes(elapsed: chrono::Duration) -> f64 {
    (elapsed.num_seconds() as f64 / 6.0).round() / 10.0
}

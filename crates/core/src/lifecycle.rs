//! Visualization lifecycle state machine.
//!
//! A visualization moves through
//! `Preparing -> Starting(Base) -> Processing(Base) -> Succeeded(Base)
//! -> [Starting(FaceSwap) -> Processing(FaceSwap) -> Succeeded(FaceSwap)]
//! -> Completed | CompletedWithError | Failed | Canceled`.
//!
//! [`on_poll`] is the single transition function: given the current state
//! and one observation of the active job, it returns the next state and the
//! side effect the caller must perform. Terminal states absorb every
//! observation.

use serde::{Deserialize, Serialize};

use crate::job::{JobKind, JobStatus};

/// Persisted status strings.
pub const STATUS_PREPARING: &str = "preparing";
pub const STATUS_PROCESSING: &str = "processing";
pub const STATUS_BASE_COMPLETED: &str = "base_completed";
pub const STATUS_FACE_SWAP_STARTING: &str = "face_swap_starting";
pub const STATUS_FACE_SWAP_PROCESSING: &str = "face_swap_processing";
pub const STATUS_FACE_SWAP_COMPLETED: &str = "face_swap_completed";
pub const STATUS_COMPLETED: &str = "completed";
pub const STATUS_COMPLETED_WITH_ERROR: &str = "completed_with_error";
pub const STATUS_FAILED: &str = "failed";
pub const STATUS_CANCELED: &str = "canceled";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VisualizationState {
    Preparing,
    Starting(JobKind),
    Processing(JobKind),
    Succeeded(JobKind),
    Completed,
    CompletedWithError,
    Failed,
    Canceled,
}

/// Side effect requested by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Record the new progress estimate and message.
    ReportProgress,
    /// Cancel the stuck job and resubmit the same stage.
    RestartStuckJob,
    /// Submit the face-swap job from the base output.
    StartFaceSwap,
    /// Save the final output to permanent storage.
    PersistResult,
    RecordFailure,
    RecordCancellation,
    /// Nothing to do (terminal state, stale observation or unknown status).
    Ignore,
}

/// Result of feeding one observation into the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: VisualizationState,
    pub action: Action,
}

/// One poll result for the currently active job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub kind: JobKind,
    pub status: JobStatus,
    /// The visualization asked for a face swap after the base stage.
    pub face_swap_requested: bool,
    /// The job exceeded the stuck threshold in `starting` and no
    /// cancellation has been attempted for it yet.
    pub stuck: bool,
}

impl VisualizationState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::CompletedWithError | Self::Failed | Self::Canceled
        )
    }

    /// Stage currently in flight, if any.
    pub fn stage(self) -> Option<JobKind> {
        match self {
            Self::Starting(kind) | Self::Processing(kind) | Self::Succeeded(kind) => Some(kind),
            _ => None,
        }
    }

    /// Status string persisted on the history record.
    pub fn as_status_str(self) -> &'static str {
        match self {
            Self::Preparing => STATUS_PREPARING,
            Self::Starting(JobKind::BaseGeneration) | Self::Processing(JobKind::BaseGeneration) => {
                STATUS_PROCESSING
            }
            Self::Succeeded(JobKind::BaseGeneration) => STATUS_BASE_COMPLETED,
            Self::Starting(JobKind::FaceSwap) => STATUS_FACE_SWAP_STARTING,
            Self::Processing(JobKind::FaceSwap) => STATUS_FACE_SWAP_PROCESSING,
            Self::Succeeded(JobKind::FaceSwap) => STATUS_FACE_SWAP_COMPLETED,
            Self::Completed => STATUS_COMPLETED,
            Self::CompletedWithError => STATUS_COMPLETED_WITH_ERROR,
            Self::Failed => STATUS_FAILED,
            Self::Canceled => STATUS_CANCELED,
        }
    }

    /// Rebuild the state from a persisted status string.
    ///
    /// `processing` is ambiguous between base starting and base processing;
    /// it maps to `Processing(BaseGeneration)`. Unknown strings map to
    /// `Preparing` so the next observation can move the record forward.
    pub fn from_status_str(status: &str) -> Self {
        match status {
            STATUS_PROCESSING => Self::Processing(JobKind::BaseGeneration),
            STATUS_BASE_COMPLETED => Self::Succeeded(JobKind::BaseGeneration),
            STATUS_FACE_SWAP_STARTING => Self::Starting(JobKind::FaceSwap),
            STATUS_FACE_SWAP_PROCESSING => Self::Processing(JobKind::FaceSwap),
            STATUS_FACE_SWAP_COMPLETED => Self::Succeeded(JobKind::FaceSwap),
            STATUS_COMPLETED => Self::Completed,
            STATUS_COMPLETED_WITH_ERROR => Self::CompletedWithError,
            STATUS_FAILED => Self::Failed,
            STATUS_CANCELED => Self::Canceled,
            _ => Self::Preparing,
        }
    }

    /// Resolve `Succeeded(Base)` once the face-swap submission has been attempted.
    pub fn after_face_swap_submission(self, submitted: bool) -> Self {
        match self {
            Self::Succeeded(JobKind::BaseGeneration) if submitted => Self::Starting(JobKind::FaceSwap),
            Self::Succeeded(JobKind::BaseGeneration) => Self::CompletedWithError,
            other => other,
        }
    }

    /// Resolve a final `Succeeded` state once persistence has been attempted.
    pub fn after_persist(self, persisted: bool) -> Self {
        match self {
            Self::Succeeded(_) if persisted => Self::Completed,
            Self::Succeeded(_) => Self::CompletedWithError,
            other => other,
        }
    }
}

/// Advance the state machine by one observation.
pub fn on_poll(current: VisualizationState, obs: Observation) -> Transition {
    let stay = Transition {
        next: current,
        action: Action::Ignore,
    };

    if current.is_terminal() {
        return stay;
    }

    // Once the face-swap stage is entered, base-stage observations are stale.
    if current.stage() == Some(JobKind::FaceSwap) && obs.kind == JobKind::BaseGeneration {
        return stay;
    }

    let (next, action) = match obs.status {
        JobStatus::Starting if obs.stuck => (VisualizationState::Starting(obs.kind), Action::RestartStuckJob),
        JobStatus::Starting => (VisualizationState::Starting(obs.kind), Action::ReportProgress),
        JobStatus::Processing => (VisualizationState::Processing(obs.kind), Action::ReportProgress),
        JobStatus::Succeeded => {
            if obs.kind == JobKind::BaseGeneration && obs.face_swap_requested {
                (VisualizationState::Succeeded(obs.kind), Action::StartFaceSwap)
            } else {
                (VisualizationState::Succeeded(obs.kind), Action::PersistResult)
            }
        }
        JobStatus::Failed => (VisualizationState::Failed, Action::RecordFailure),
        JobStatus::Canceled => (VisualizationState::Canceled, Action::RecordCancellation),
        JobStatus::Unknown => return stay,
    };

    Transition { next, action }
}

/// User-facing message for a provider status in the given stage.
pub fn status_message(kind: JobKind, status: JobStatus) -> String {
    let face_swap = kind == JobKind::FaceSwap;
    let msg = match status {
        JobStatus::Starting if face_swap => "Starting face swap...",
        JobStatus::Starting => "Starting dream generation...",
        JobStatus::Processing if face_swap => "Processing face swap...",
        JobStatus::Processing => "Generating your dream...",
        JobStatus::Succeeded if face_swap => "Face swap completed successfully",
        JobStatus::Succeeded => "Dream generated successfully",
        JobStatus::Failed if face_swap => "Face swap failed",
        JobStatus::Failed => "Dream generation failed",
        JobStatus::Canceled if face_swap => "Face swap was canceled",
        JobStatus::Canceled => "Dream generation was canceled",
        JobStatus::Unknown => return format!("Unexpected status: {}", status.as_str()),
    };
    msg.to_string()
}

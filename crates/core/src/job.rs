//! Job (external prediction) kinds and provider-reported statuses.

use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

/// Which stage of a visualization a job belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Text-to-image or text-to-video generation from the user's prompt.
    BaseGeneration,
    /// Compositing the user's portrait onto the base output.
    FaceSwap,
}

impl JobKind {
    /// Resolve the kind from the client-supplied `isFaceSwapPrediction` flag.
    pub fn from_face_swap_flag(is_face_swap: bool) -> Self {
        if is_face_swap {
            Self::FaceSwap
        } else {
            Self::BaseGeneration
        }
    }

    /// Human-readable label used in log lines.
    pub fn label(self) -> &'static str {
        match self {
            Self::BaseGeneration => "base generation",
            Self::FaceSwap => "face swap",
        }
    }
}

/// Status of a job as reported by the inference provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
    /// Any status string this client does not know about.
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    /// Wire name of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Processing => "processing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
            Self::Unknown => "unknown",
        }
    }

    /// `true` once the provider will no longer change the job.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }
}

/// Elapsed time of a job that has sat in `starting` for longer than `threshold`.
///
/// Returns `None` for any other status, for jobs without a creation time and
/// for jobs still within the threshold.
pub fn stuck_elapsed(
    status: JobStatus,
    created_at: Option<Timestamp>,
    now: Timestamp,
    threshold: chrono::Duration,
) -> Option<chrono::Duration> {
    if status != JobStatus::Starting {
        return None;
    }
    let elapsed = now - created_at?;
    (elapsed > threshold).then_some(elapsed)
}

use visionary_core::error::CoreError;
use visionary_core::output::ExtractionError;
use visionary_replicate::ReplicateApiError;

/// Errors surfaced by the orchestration pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Missing or invalid request fields. Reported to the caller as is.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The inference provider rejected the job or returned no job id.
    #[error("Job submission failed: {0}")]
    SubmissionFailed(String),

    /// A job succeeded but its output holds no usable media URL.
    #[error(transparent)]
    ExtractionFailed(#[from] ExtractionError),

    /// The result could not be written to permanent storage.
    #[error("Failed to save result: {0}")]
    PersistenceFailed(String),

    /// Network failure while polling the active job.
    #[error("Polling failed: {0}")]
    PollingTransport(#[source] ReplicateApiError),

    /// A job stuck in `starting` could not be restarted.
    #[error("Job {prediction_id} is stuck: {reason}")]
    StuckJob { prediction_id: String, reason: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<CoreError> for PipelineError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(msg) => Self::Validation(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}

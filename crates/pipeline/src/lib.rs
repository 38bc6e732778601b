//! Orchestration of visualization jobs against the inference provider.
//!
//! [`StartService`] submits the base job and creates the history record;
//! [`Orchestrator`] advances it one poll at a time; [`PollLoop`] drives the
//! orchestrator on a timer when polling runs server-side.

pub mod access_url;
pub mod config;
pub mod context;
pub mod enhancer;
pub mod error;
pub mod orchestrator;
pub mod poll_loop;
pub mod recorder;
pub mod start;
pub mod submitter;

pub use access_url::AccessUrlResolver;
pub use config::{PipelineConfig, ProviderConfig};
pub use context::PipelineContext;
pub use enhancer::PromptEnhancer;
pub use error::PipelineError;
pub use orchestrator::{Orchestrator, PollRequest, PollResponse};
pub use poll_loop::{PollLoop, PollOutcome};
pub use recorder::{HistoryKey, HistoryRecorder, HistoryStore, HistoryStoreError, PgHistoryStore};
pub use start::{StartResponse, StartService};
pub use submitter::{JobHandle, JobSubmitter};

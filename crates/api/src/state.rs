use std::sync::Arc;

use visionary_pipeline::PipelineContext;

use crate::background::BackgroundPolling;
use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool, used by the health check.
    pub pool: visionary_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Inference, storage, fetcher and history handles for the pipeline.
    pub pipeline: PipelineContext,
    /// Server-side poll loops started by `POST /visualizations`.
    pub background: BackgroundPolling,
}

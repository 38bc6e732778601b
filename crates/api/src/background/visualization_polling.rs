//! Server-side polling of started visualizations.
//!
//! When enabled, every successful start spawns one [`PollLoop`] that drives
//! the record to a terminal state without a client polling it. All loops
//! share a parent cancellation token and a task tracker so shutdown can stop
//! them and wait for in-flight polls.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use visionary_pipeline::{Orchestrator, PipelineContext, PollLoop, PollOutcome, PollRequest, StartResponse};

/// Handle to the set of running background poll loops.
#[derive(Clone, Default)]
pub struct BackgroundPolling {
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl BackgroundPolling {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a poll loop for a just-started visualization.
    pub fn spawn(&self, ctx: PipelineContext, started: &StartResponse) {
        let request = PollRequest {
            prediction_id: started.prediction_id.clone(),
            history_id: started.history_id,
            needs_face_swap: started.needs_face_swap,
            face_swap_input_image: started.face_swap_input_image.clone(),
            is_face_swap_prediction: false,
        };
        let interval = ctx.config.poll_interval;
        let poll_loop = PollLoop::new(Orchestrator::new(ctx), interval);
        let cancel = self.cancel.child_token();

        tracing::debug!(
            prediction_id = %request.prediction_id,
            history_id = ?request.history_id,
            "Background polling started"
        );

        self.tracker.spawn(async move {
            let prediction_id = request.prediction_id.clone();
            let history_id = request.history_id;
            match poll_loop.run(request, cancel).await {
                PollOutcome::Finished(response) => tracing::info!(
                    prediction_id = %response.prediction_id,
                    history_id = ?history_id,
                    status = %response.status,
                    success = response.success,
                    "Background polling finished"
                ),
                PollOutcome::Cancelled => tracing::debug!(
                    %prediction_id,
                    history_id = ?history_id,
                    "Background polling cancelled"
                ),
                PollOutcome::Failed(e) => tracing::error!(
                    %prediction_id,
                    history_id = ?history_id,
                    error = %e,
                    "Background polling stopped"
                ),
            }
        });
    }

    /// Number of loops still running.
    pub fn active(&self) -> usize {
        self.tracker.len()
    }

    /// Cancel every loop and wait up to `timeout` for them to wind down.
    pub async fn shutdown(&self, timeout: Duration) {
        self.cancel.cancel();
        self.tracker.close();
        if tokio::time::timeout(timeout, self.tracker.wait()).await.is_err() {
            tracing::warn!(
                remaining = self.tracker.len(),
                "Background polling did not stop within the shutdown timeout"
            );
        }
    }
}

//! Server-side poll loop.
//!
//! Drives [`Orchestrator::poll`] at a fixed interval the way a client
//! would. The active key only changes between ticks, so a single loop never
//! has two polls in flight for the same visualization.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::PipelineError;
use crate::orchestrator::{Orchestrator, PollRequest, PollResponse, STATUS_TRANSITIONING_TO_FACE_SWAP};

/// How a poll loop ended.
#[derive(Debug)]
pub enum PollOutcome {
    /// The last job reached a terminal state.
    Finished(PollResponse),
    Cancelled,
    /// Polling the provider failed; the record stays as it was.
    Failed(PipelineError),
}

#[derive(Clone)]
pub struct PollLoop {
    orchestrator: Orchestrator,
    interval: Duration,
}

impl PollLoop {
    /// A zero `interval` is raised to one millisecond.
    pub fn new(orchestrator: Orchestrator, interval: Duration) -> Self {
        Self {
            orchestrator,
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    /// Run on a background task.
    pub fn spawn(self, request: PollRequest, cancel: CancellationToken) -> JoinHandle<PollOutcome> {
        tokio::spawn(async move { self.run(request, cancel).await })
    }

    /// Poll until a terminal response, a transport failure or cancellation.
    pub async fn run(&self, mut request: PollRequest, cancel: CancellationToken) -> PollOutcome {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            prediction_id = %request.prediction_id,
            history_id = ?request.history_id,
            poll_interval_ms = self.interval.as_millis() as u64,
            "Poll loop started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(prediction_id = %request.prediction_id, "Poll loop cancelled");
                    return PollOutcome::Cancelled;
                }
                _ = ticker.tick() => {
                    let response = match self.orchestrator.poll(&request).await {
                        Ok(response) => response,
                        Err(e) => {
                            tracing::error!(
                                prediction_id = %request.prediction_id,
                                history_id = ?request.history_id,
                                error = %e,
                                "Poll loop halted",
                            );
                            return PollOutcome::Failed(e);
                        }
                    };

                    if request.history_id.is_none() {
                        request.history_id = response.history_id;
                    }

                    if let Some(next) = response.next_prediction_id.clone() {
                        if response.status == STATUS_TRANSITIONING_TO_FACE_SWAP {
                            request.is_face_swap_prediction = true;
                        }
                        tracing::info!(
                            from = %request.prediction_id,
                            to = %next,
                            status = %response.status,
                            "Poll loop switching active job",
                        );
                        request.prediction_id = next;
                        ticker.reset();
                        continue;
                    }

                    if response.is_final() {
                        tracing::info!(
                            prediction_id = %request.prediction_id,
                            history_id = ?request.history_id,
                            status = %response.status,
                            success = response.success,
                            "Poll loop finished",
                        );
                        return PollOutcome::Finished(response);
                    }
                }
            }
        }
    }
}

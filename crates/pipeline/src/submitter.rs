//! Job Submitter: starts base-generation and face-swap jobs.

use std::sync::Arc;

use visionary_core::job::JobKind;
use visionary_core::visualization::face_swap_input;
use visionary_replicate::InferenceApi;
use visionary_storage::MediaFetcher;

use crate::access_url::AccessUrlResolver;
use crate::config::PipelineConfig;
use crate::error::PipelineError;

/// A submitted job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub id: String,
    pub kind: JobKind,
}

#[derive(Clone)]
pub struct JobSubmitter {
    inference: Arc<dyn InferenceApi>,
    fetcher: Arc<dyn MediaFetcher>,
    resolver: AccessUrlResolver,
    config: Arc<PipelineConfig>,
}

impl JobSubmitter {
    pub fn new(
        inference: Arc<dyn InferenceApi>,
        fetcher: Arc<dyn MediaFetcher>,
        resolver: AccessUrlResolver,
        config: Arc<PipelineConfig>,
    ) -> Self {
        Self {
            inference,
            fetcher,
            resolver,
            config,
        }
    }

    /// Submit a base-generation job with a fully shaped input.
    pub async fn submit_base(&self, model: &str, input: &serde_json::Value) -> Result<JobHandle, PipelineError> {
        self.submit(JobKind::BaseGeneration, model, input).await
    }

    /// Submit a face-swap job placing the face from `portrait_url` onto `base_url`.
    ///
    /// Both inputs go through the access-URL resolver and a content fetch.
    /// An unreachable input is only logged unless strict checking is on.
    pub async fn submit_face_swap(&self, base_url: &str, portrait_url: &str) -> Result<JobHandle, PipelineError> {
        let base = self.resolver.resolve(base_url).await;
        let portrait = self.resolver.resolve(portrait_url).await;

        for (role, url) in [("base", &base), ("portrait", &portrait)] {
            if let Err(reason) = self.verify_reachable(url).await {
                tracing::warn!(role, url = %url, reason = %reason, "Face swap input may not be accessible");
                if self.config.strict_input_check {
                    return Err(PipelineError::SubmissionFailed(format!(
                        "{role} image is not accessible: {reason}"
                    )));
                }
            }
        }

        let input = face_swap_input(&base, &portrait);
        let model = self.config.face_swap_model.clone();
        self.submit(JobKind::FaceSwap, &model, &input).await
    }

    async fn submit(&self, kind: JobKind, model: &str, input: &serde_json::Value) -> Result<JobHandle, PipelineError> {
        let prediction = self.inference.submit(model, input).await.map_err(|e| {
            tracing::error!(stage = kind.label(), model, error = %e, "Job submission failed");
            PipelineError::SubmissionFailed(e.to_string())
        })?;

        if prediction.id.is_empty() {
            return Err(PipelineError::SubmissionFailed("provider returned no job id".into()));
        }

        tracing::info!(
            stage = kind.label(),
            model,
            prediction_id = %prediction.id,
            "Job submitted",
        );
        Ok(JobHandle {
            id: prediction.id,
            kind,
        })
    }

    /// Fetch the full content of an input URL. Inline data URLs are trusted.
    async fn verify_reachable(&self, url: &str) -> Result<(), String> {
        if url.starts_with("data:") {
            return Ok(());
        }
        match self.fetcher.fetch(url, self.config.fetch_timeout).await {
            Ok(media) if media.bytes.is_empty() => Err("empty response body".into()),
            Ok(_) => Ok(()),
            Err(e) => Err(e.to_string()),
        }
    }
}

//! Trait seam over the inference API so the pipeline can run against fakes.

use async_trait::async_trait;

use crate::api::{Prediction, ReplicateApi, ReplicateApiError};

/// Operations the pipeline needs from an inference provider.
#[async_trait]
pub trait InferenceApi: Send + Sync + 'static {
    /// Start a job for `model`; the returned prediction always has an id.
    async fn submit(&self, model: &str, input: &serde_json::Value) -> Result<Prediction, ReplicateApiError>;

    /// Poll a job by id.
    async fn get(&self, prediction_id: &str) -> Result<Prediction, ReplicateApiError>;

    /// Ask the provider to cancel a job.
    async fn cancel(&self, prediction_id: &str) -> Result<(), ReplicateApiError>;
}

#[async_trait]
impl InferenceApi for ReplicateApi {
    async fn submit(&self, model: &str, input: &serde_json::Value) -> Result<Prediction, ReplicateApiError> {
        self.create_prediction(model, input).await
    }

    async fn get(&self, prediction_id: &str) -> Result<Prediction, ReplicateApiError> {
        self.get_prediction(prediction_id).await
    }

    async fn cancel(&self, prediction_id: &str) -> Result<(), ReplicateApiError> {
        self.cancel_prediction(prediction_id).await
    }
}

//! REST client for the hosted inference (prediction) API.
//!
//! Wraps prediction submission, polling and cancellation using [`reqwest`].
//! Requests carry the API token as a bearer credential.

use serde::Deserialize;
use visionary_core::job::JobStatus;
use visionary_core::types::Timestamp;

/// Default base URL of the inference API.
pub const DEFAULT_API_URL: &str = "https://api.replicate.com/v1";

/// HTTP client for the inference API.
pub struct ReplicateApi {
    client: reqwest::Client,
    api_url: String,
    token: String,
}

/// A prediction as returned by create, get and cancel.
#[derive(Debug, Clone, Deserialize)]
pub struct Prediction {
    /// Provider-assigned job id. Empty if the provider omitted it.
    #[serde(default)]
    pub id: String,
    pub status: JobStatus,
    /// Raw model output; shape varies per model.
    #[serde(default)]
    pub output: Option<serde_json::Value>,
    /// Provider error; usually a string, occasionally structured.
    #[serde(default)]
    pub error: Option<serde_json::Value>,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
}

impl Prediction {
    /// Provider error text, if any.
    pub fn error_message(&self) -> Option<String> {
        match self.error.as_ref()? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) if s.is_empty() => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// Errors from the inference API layer.
#[derive(Debug, thiserror::Error)]
pub enum ReplicateApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The API returned a non-2xx status code.
    #[error("Inference API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A prediction was created but the response carried no id.
    #[error("Inference API returned a prediction without an id")]
    MissingPredictionId,
}

/// Where a model reference is submitted.
#[derive(Debug, PartialEq, Eq)]
enum ModelRef<'a> {
    /// `owner/name:version` goes to `POST /predictions` with a `version`.
    Version(&'a str),
    /// `owner/name` goes to `POST /models/{owner}/{name}/predictions`.
    Model(&'a str),
}

fn parse_model_ref(model: &str) -> ModelRef<'_> {
    match model.split_once(':') {
        Some((_, version)) if !version.is_empty() => ModelRef::Version(version),
        _ => ModelRef::Model(model),
    }
}

impl ReplicateApi {
    /// Create a new API client.
    ///
    /// * `api_url` - Base URL including the version prefix, e.g.
    ///   `https://api.replicate.com/v1`.
    pub fn new(api_url: String, token: String) -> Self {
        Self::with_client(reqwest::Client::new(), api_url, token)
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: String, token: String) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Start a prediction for `model` with the given input.
    ///
    /// Version-pinned references (`owner/name:version`) use the generic
    /// predictions endpoint; bare `owner/name` references use the model's
    /// own endpoint (latest deployment).
    pub async fn create_prediction(
        &self,
        model: &str,
        input: &serde_json::Value,
    ) -> Result<Prediction, ReplicateApiError> {
        let request = match parse_model_ref(model) {
            ModelRef::Version(version) => self
                .client
                .post(format!("{}/predictions", self.api_url))
                .json(&serde_json::json!({ "version": version, "input": input })),
            ModelRef::Model(name) => self
                .client
                .post(format!("{}/models/{}/predictions", self.api_url, name))
                .json(&serde_json::json!({ "input": input })),
        };

        let response = request.bearer_auth(&self.token).send().await?;
        let prediction: Prediction = Self::parse_response(response).await?;

        if prediction.id.is_empty() {
            return Err(ReplicateApiError::MissingPredictionId);
        }
        tracing::debug!(model, prediction_id = %prediction.id, status = ?prediction.status, "Prediction created");
        Ok(prediction)
    }

    /// Fetch the current state of a prediction (`GET /predictions/{id}`).
    pub async fn get_prediction(&self, id: &str) -> Result<Prediction, ReplicateApiError> {
        let response = self
            .client
            .get(format!("{}/predictions/{}", self.api_url, id))
            .bearer_auth(&self.token)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Cancel a prediction (`POST /predictions/{id}/cancel`).
    pub async fn cancel_prediction(&self, id: &str) -> Result<(), ReplicateApiError> {
        let response = self
            .client
            .post(format!("{}/predictions/{}/cancel", self.api_url, id))
            .bearer_auth(&self.token)
            .send()
            .await?;

        Self::check_status(response).await?;
        tracing::debug!(prediction_id = id, "Prediction cancel requested");
        Ok(())
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`ReplicateApiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ReplicateApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::warn!(status = status.as_u16(), body = %body, "Inference API returned an error");
            return Err(ReplicateApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ReplicateApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), ReplicateApiError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}

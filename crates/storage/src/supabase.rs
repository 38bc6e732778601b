//! REST client for the object storage service.

use async_trait::async_trait;
use serde::Deserialize;

/// Object storage operations used by the pipeline.
#[async_trait]
pub trait ObjectStorage: Send + Sync + 'static {
    /// Upload (or overwrite) an object. Returns the stored object path.
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError>;

    /// Create a time-limited signed URL for a private object.
    async fn create_signed_url(&self, bucket: &str, path: &str, ttl_secs: u64) -> Result<String, StorageError>;

    /// Public URL of an object. No request is made.
    fn public_url(&self, bucket: &str, path: &str) -> String;
}

/// Errors from the storage REST API.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The storage service returned a non-2xx status code.
    #[error("Storage API error ({status}): {body}")]
    ApiError { status: u16, body: String },

    /// The response parsed but lacked the expected field.
    #[error("Unexpected storage response: {0}")]
    InvalidResponse(String),
}

/// HTTP client for the storage service of one project.
pub struct SupabaseStorage {
    client: reqwest::Client,
    /// Project base URL, e.g. `https://abc.supabase.co`.
    base_url: String,
    service_key: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(rename = "Key")]
    key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SignResponse {
    #[serde(rename = "signedURL")]
    signed_url: Option<String>,
}

impl SupabaseStorage {
    pub fn new(base_url: String, service_key: String) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, service_key)
    }

    pub fn with_client(client: reqwest::Client, base_url: String, service_key: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key,
        }
    }

    fn object_url(&self, kind: &str, bucket: &str, path: &str) -> String {
        format!(
            "{}/storage/v1/object/{kind}{bucket}/{}",
            self.base_url,
            path.trim_start_matches('/')
        )
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
    }

    /// Ensure the response has a success status code, capturing the body
    /// text on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, StorageError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(StorageError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl ObjectStorage for SupabaseStorage {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let response = self
            .authorized(self.client.post(self.object_url("", bucket, path)))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        let body: UploadResponse = response.json().await?;
        tracing::debug!(bucket, path, key = ?body.key, "Object uploaded");
        Ok(path.to_string())
    }

    async fn create_signed_url(&self, bucket: &str, path: &str, ttl_secs: u64) -> Result<String, StorageError> {
        let response = self
            .authorized(self.client.post(self.object_url("sign/", bucket, path)))
            .json(&serde_json::json!({ "expiresIn": ttl_secs }))
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        let body: SignResponse = response.json().await?;
        let signed = body
            .signed_url
            .filter(|s| !s.is_empty())
            .ok_or_else(|| StorageError::InvalidResponse("missing signedURL".to_string()))?;

        Ok(format!("{}/storage/v1{}", self.base_url, signed))
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        self.object_url("public/", bucket, path)
    }
}

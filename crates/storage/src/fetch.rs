//! Fetching remote media with bounded timeouts.

use std::time::Duration;

use async_trait::async_trait;

/// User agent sent with every media request.
const USER_AGENT: &str = concat!("visionary-pipeline/", env!("CARGO_PKG_VERSION"));

/// Content type assumed when the server sends none.
pub const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

/// A downloaded media blob.
#[derive(Debug, Clone)]
pub struct FetchedMedia {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Network failure or timeout.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server answered with a non-2xx status.
    #[error("Fetching {url} returned status {status}")]
    Status { url: String, status: u16 },
}

/// Remote media access used by the access-URL resolver and result persistence.
#[async_trait]
pub trait MediaFetcher: Send + Sync + 'static {
    /// Existence probe (`HEAD`). Returns the HTTP status code.
    async fn probe(&self, url: &str, timeout: Duration) -> Result<u16, FetchError>;

    /// Full download (`GET`). Non-2xx responses are errors.
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedMedia, FetchError>;
}

/// [`MediaFetcher`] backed by [`reqwest`].
#[derive(Clone, Default)]
pub struct HttpMediaFetcher {
    client: reqwest::Client,
}

impl HttpMediaFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MediaFetcher for HttpMediaFetcher {
    async fn probe(&self, url: &str, timeout: Duration) -> Result<u16, FetchError> {
        let response = self
            .client
            .head(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .timeout(timeout)
            .send()
            .await?;
        Ok(response.status().as_u16())
    }

    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedMedia, FetchError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let bytes = response.bytes().await?.to_vec();

        Ok(FetchedMedia { bytes, content_type })
    }
}

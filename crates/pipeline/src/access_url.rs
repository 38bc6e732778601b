//! Access-URL Resolver.
//!
//! Turns a stored-object reference into a URL the inference provider can
//! fetch. Resolution never fails: every step that does not work falls back
//! to the next one, and the last resort is the input URL itself.
//!
//! 1. URLs that already carry a signed token or `download=true` pass through.
//! 2. User uploads get a 10-hour signed URL; failing that the
//!    `download=true` URL if a probe reaches it; failing that an inline
//!    base64 data URL; failing that the original URL.
//! 3. Other storage objects get a 1-hour signed URL, else `download=true`.
//! 4. External URLs pass through.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use visionary_core::storage_url::{
    has_access_marker, is_storage_object_url, parse_public_object_url, with_download_marker, StorageObjectRef,
};
use visionary_storage::{MediaFetcher, ObjectStorage};

use crate::config::{PipelineConfig, STORAGE_SIGNED_URL_TTL_SECS, USER_UPLOAD_SIGNED_URL_TTL_SECS};

/// Which resolution path produced a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedVia {
    AlreadyAccessible,
    SignedUrl,
    DownloadMarker,
    DataUrl,
    Original,
    External,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUrl {
    pub url: String,
    pub via: ResolvedVia,
}

impl ResolvedUrl {
    fn new(url: impl Into<String>, via: ResolvedVia) -> Self {
        Self { url: url.into(), via }
    }
}

#[derive(Clone)]
pub struct AccessUrlResolver {
    storage: Arc<dyn ObjectStorage>,
    fetcher: Arc<dyn MediaFetcher>,
    config: Arc<PipelineConfig>,
}

impl AccessUrlResolver {
    pub fn new(storage: Arc<dyn ObjectStorage>, fetcher: Arc<dyn MediaFetcher>, config: Arc<PipelineConfig>) -> Self {
        Self {
            storage,
            fetcher,
            config,
        }
    }

    /// Resolve `url` to a provider-fetchable URL.
    pub async fn resolve(&self, url: &str) -> String {
        self.resolve_detailed(url).await.url
    }

    /// Like [`resolve`](Self::resolve), also reporting the path taken.
    pub async fn resolve_detailed(&self, url: &str) -> ResolvedUrl {
        if has_access_marker(url) {
            tracing::debug!(url, "URL already carries an access marker");
            return ResolvedUrl::new(url, ResolvedVia::AlreadyAccessible);
        }

        let object = parse_public_object_url(url);
        if self.is_user_upload(url, object.as_ref()) {
            return self.resolve_user_upload(url, object).await;
        }

        if is_storage_object_url(url) {
            return self.resolve_storage_object(url, object).await;
        }

        ResolvedUrl::new(url, ResolvedVia::External)
    }

    fn is_user_upload(&self, url: &str, object: Option<&StorageObjectRef>) -> bool {
        let bucket = &self.config.user_uploads_bucket;
        match object {
            Some(obj) => &obj.bucket == bucket,
            None => is_storage_object_url(url) && url.contains(bucket.as_str()),
        }
    }

    async fn resolve_user_upload(&self, url: &str, object: Option<StorageObjectRef>) -> ResolvedUrl {
        let Some(object) = object else {
            tracing::warn!(url, "Invalid user-upload URL format, using download marker");
            return ResolvedUrl::new(with_download_marker(url), ResolvedVia::DownloadMarker);
        };

        match self
            .storage
            .create_signed_url(&object.bucket, &object.path, USER_UPLOAD_SIGNED_URL_TTL_SECS)
            .await
        {
            Ok(signed) => {
                tracing::info!(bucket = %object.bucket, path = %object.path, "Resolved user upload to signed URL");
                return ResolvedUrl::new(signed, ResolvedVia::SignedUrl);
            }
            Err(e) => {
                tracing::warn!(
                    bucket = %object.bucket,
                    path = %object.path,
                    error = %e,
                    "Signed URL failed for user upload, trying download marker",
                );
            }
        }

        let marked = with_download_marker(url);
        match self.fetcher.probe(&marked, self.config.probe_timeout).await {
            Ok(status) if (200..300).contains(&status) => {
                tracing::info!(url = %marked, "Resolved user upload to download-marker URL");
                return ResolvedUrl::new(marked, ResolvedVia::DownloadMarker);
            }
            Ok(status) => {
                tracing::warn!(url = %marked, status, "Download-marker URL not accessible, trying data URL");
            }
            Err(e) => {
                tracing::warn!(url = %marked, error = %e, "Download-marker probe failed, trying data URL");
            }
        }

        match self.fetcher.fetch(url, self.config.fetch_timeout).await {
            Ok(media) if !media.bytes.is_empty() => {
                tracing::info!(
                    url,
                    bytes = media.bytes.len(),
                    content_type = %media.content_type,
                    "Resolved user upload to inline data URL",
                );
                let encoded = STANDARD.encode(&media.bytes);
                ResolvedUrl::new(
                    format!("data:{};base64,{encoded}", media.content_type),
                    ResolvedVia::DataUrl,
                )
            }
            Ok(_) => {
                tracing::error!(url, "User upload is empty, returning original URL");
                ResolvedUrl::new(url, ResolvedVia::Original)
            }
            Err(e) => {
                tracing::error!(url, error = %e, "All access fallbacks failed, returning original URL");
                ResolvedUrl::new(url, ResolvedVia::Original)
            }
        }
    }

    async fn resolve_storage_object(&self, url: &str, object: Option<StorageObjectRef>) -> ResolvedUrl {
        let Some(object) = object else {
            tracing::warn!(url, "Invalid storage URL format, using download marker");
            return ResolvedUrl::new(with_download_marker(url), ResolvedVia::DownloadMarker);
        };

        match self
            .storage
            .create_signed_url(&object.bucket, &object.path, STORAGE_SIGNED_URL_TTL_SECS)
            .await
        {
            Ok(signed) => {
                tracing::info!(bucket = %object.bucket, path = %object.path, "Resolved storage object to signed URL");
                ResolvedUrl::new(signed, ResolvedVia::SignedUrl)
            }
            Err(e) => {
                tracing::warn!(
                    bucket = %object.bucket,
                    path = %object.path,
                    error = %e,
                    "Signed URL failed for storage object, using download marker",
                );
                ResolvedUrl::new(with_download_marker(url), ResolvedVia::DownloadMarker)
            }
        }
    }
}

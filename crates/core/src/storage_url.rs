//! Parsing and rewriting of object-storage URLs.
//!
//! Public object URLs have the shape
//! `{base}/storage/v1/object/public/{bucket}/{path}`. Signed URLs carry a
//! `token` query parameter; direct-download URLs carry `download=true`.

use url::Url;

/// Path segment that precedes `{bucket}/{path}` in a public object URL.
pub const PUBLIC_OBJECT_MARKER: &str = "/storage/v1/object/public/";

/// A bucket/path pair extracted from a public object URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageObjectRef {
    pub bucket: String,
    pub path: String,
}

/// `true` if the URL points into the object store's public object namespace.
pub fn is_storage_object_url(url: &str) -> bool {
    url.contains(PUBLIC_OBJECT_MARKER)
}

/// Split a public object URL into bucket and object path.
///
/// Returns `None` when the marker is missing, appears more than once, or
/// either half is empty. Any query string or fragment is dropped from the
/// object path.
pub fn parse_public_object_url(url: &str) -> Option<StorageObjectRef> {
    let mut halves = url.split(PUBLIC_OBJECT_MARKER);
    let _base = halves.next()?;
    let rest = halves.next()?;
    if halves.next().is_some() {
        return None;
    }

    let rest = rest.split(['?', '#']).next().unwrap_or_default();
    let (bucket, path) = rest.split_once('/')?;
    if bucket.is_empty() || path.is_empty() {
        return None;
    }

    Some(StorageObjectRef {
        bucket: bucket.to_string(),
        path: path.to_string(),
    })
}

/// `true` if the URL already grants access on its own: a signed `token`
/// query parameter or a `download=true` marker.
pub fn has_access_marker(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => parsed
            .query_pairs()
            .any(|(k, v)| k == "token" || (k == "download" && v == "true")),
        Err(_) => url.contains("?token=") || url.contains("download=true"),
    }
}

/// Append `download=true` to the URL's query unless it is already present.
///
/// Unparseable input gets the marker appended textually so callers always
/// receive a non-empty URL back.
pub fn with_download_marker(url: &str) -> String {
    if has_download_marker(url) {
        return url.to_string();
    }

    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.query_pairs_mut().append_pair("download", "true");
            parsed.into()
        }
        Err(_) => {
            let separator = if url.contains('?') { '&' } else { '?' };
            format!("{url}{separator}download=true")
        }
    }
}

fn has_download_marker(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => parsed
            .query_pairs()
            .any(|(k, v)| k == "download" && v == "true"),
        Err(_) => url.contains("download=true"),
    }
}

/// Object path for a persisted result: `{folder}/{history_id}/{prediction_id}.{ext}`.
///
/// Deterministic per job so a repeated save overwrites the same artifact.
pub fn result_object_path(folder: &str, history_key: &str, prediction_id: &str, ext: &str) -> String {
    format!("{folder}/{history_key}/{prediction_id}.{ext}")
}

/// File extension for a fetched media blob.
///
/// The `Content-Type` wins; otherwise the extension of the source URL's path
/// is used; otherwise `jpg`.
pub fn media_extension(content_type: Option<&str>, source_url: &str) -> &'static str {
    if let Some(ct) = content_type {
        let essence = ct.split(';').next().unwrap_or_default().trim();
        match essence {
            "image/png" => return "png",
            "image/jpeg" | "image/jpg" => return "jpg",
            "image/webp" => return "webp",
            "image/gif" => return "gif",
            "video/mp4" => return "mp4",
            "video/webm" => return "webm",
            "video/quicktime" => return "mov",
            _ => {}
        }
    }

    let path = Url::parse(source_url)
        .map(|u| u.path().to_ascii_lowercase())
        .unwrap_or_default();
    ["png", "jpg", "jpeg", "webp", "gif", "mp4", "webm", "mov"]
        .into_iter()
        .find(|ext| path.ends_with(&format!(".{ext}")))
        .map(|ext| if ext == "jpeg" { "jpg" } else { ext })
        .unwrap_or("jpg")
}

//! Extraction of a single media URL from a job's raw `output` value.
//!
//! Model providers return inconsistent shapes (bare string, list of
//! strings, list of objects, object with `url`/`image`/`video`, nested
//! `output`). The search order below is a disambiguation rule that callers
//! depend on, so it must stay stable:
//!
//! 1. A string starting with `http://` or `https://` is returned as is.
//! 2. A sequence yields its first URL-shaped string; failing that its first
//!    element if that is a string (URL-shaped or not); failing that the first
//!    URL-shaped value inside its first element when that is an object.
//! 3. An object is checked for `url`, `image`, `video` (in that order), then
//!    recursed into through `output`, then scanned for any URL-shaped value.
//! 4. Anything else is an [`ExtractionError`].

use serde_json::Value;

/// The job succeeded but no usable URL could be found in its output.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("No media URL found in job output: {output}")]
pub struct ExtractionError {
    /// Compact JSON rendering of the offending output, for logs.
    pub output: String,
}

/// Keys checked on an object before falling back to a full scan.
const PRIORITY_KEYS: [&str; 3] = ["url", "image", "video"];

/// Extract the media URL from a job output using the documented priority order.
pub fn extract_output_url(output: &Value) -> Result<String, ExtractionError> {
    find_url(output).ok_or_else(|| ExtractionError {
        output: output.to_string(),
    })
}

/// `true` if the string looks like an HTTP(S) URL.
pub fn is_url_shaped(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn find_url(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if is_url_shaped(s) => Some(s.clone()),
        Value::Array(items) => from_sequence(items),
        Value::Object(map) => from_mapping(map),
        _ => None,
    }
}

fn from_sequence(items: &[Value]) -> Option<String> {
    if let Some(url) = items.iter().find_map(url_string) {
        return Some(url);
    }

    match items.first()? {
        Value::String(first) => Some(first.clone()),
        Value::Object(first) => first.values().find_map(url_string),
        _ => None,
    }
}

fn from_mapping(map: &serde_json::Map<String, Value>) -> Option<String> {
    for key in PRIORITY_KEYS {
        if let Some(Value::String(s)) = map.get(key) {
            return Some(s.clone());
        }
    }

    if let Some(nested) = map.get("output") {
        return find_url(nested);
    }

    map.values().find_map(url_string)
}

fn url_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if is_url_shaped(s) => Some(s.clone()),
        _ => None,
    }
}

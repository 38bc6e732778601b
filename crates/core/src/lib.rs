//! Pure domain logic for AI visualizations: job and lifecycle types,
//! output extraction, storage-URL handling, progress estimation and
//! request validation. No I/O happens in this crate.

pub mod error;
pub mod job;
pub mod lifecycle;
pub mod output;
pub mod progress;
pub mod storage_url;
pub mod types;
pub mod visualization;

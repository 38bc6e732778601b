//! Object storage and remote media access.
//!
//! [`SupabaseStorage`] talks to the storage REST API (upload, signed URLs,
//! public URLs); [`HttpMediaFetcher`] probes and downloads arbitrary media
//! URLs with bounded timeouts. Both sit behind traits so the pipeline can
//! run against in-memory fakes.

pub mod fetch;
pub mod supabase;

pub use fetch::{FetchError, FetchedMedia, HttpMediaFetcher, MediaFetcher};
pub use supabase::{ObjectStorage, StorageError, SupabaseStorage};

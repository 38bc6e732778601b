//! Client for the hosted inference API (prediction submit, poll, cancel).

pub mod api;
pub mod inference;

pub use api::{Prediction, ReplicateApi, ReplicateApiError};
pub use inference::InferenceApi;

//! Request handlers.
//!
//! Handlers delegate to the services in `visionary_pipeline` and map errors
//! via [`AppError`](crate::error::AppError).

pub mod history;
pub mod prompts;
pub mod visualizations;

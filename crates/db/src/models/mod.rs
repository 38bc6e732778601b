pub mod history;
pub mod processing_metadata;

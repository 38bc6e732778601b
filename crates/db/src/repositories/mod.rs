pub mod history_repo;
pub mod processing_metadata_repo;

pub use history_repo::HistoryRepo;
pub use processing_metadata_repo::ProcessingMetadataRepo;

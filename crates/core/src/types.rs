/// Primary key of a `creation_history` row.
pub type HistoryId = uuid::Uuid;

/// Identifier of an end user (owner of a history row).
pub type UserId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

//! Error types for silt-core

use thiserror::Error;

/// Result type alias using silt-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in silt-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Target row or path does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unprocessable request: bad field, duplicate, quota, invalid share
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Caller lacks ownership or a grant on the target
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A conditional update matched zero rows: someone else changed the row
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Content storage backend error
    #[error("Storage error: {0}")]
    Storage(String),

    /// A maintenance job refused to start a second concurrent pass
    #[error("Job already running: {0}")]
    JobRunning(&'static str),
}

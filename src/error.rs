//! Error types for Planboard
//!
//! Centralized error handling using thiserror.

use std::path::PathBuf;

use thiserror::Error;

/// All error types that can occur in Planboard
#[derive(Debug, Error)]
pub enum PlanboardError {
    /// Caller supplied a malformed or incomplete request
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Duration label outside the known bucket set
    #[error("Unknown duration: {0}")]
    UnknownDuration(String),

    /// Storage/persistence error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Storage directory could not be prepared; nothing else can run
    #[error("Storage init failed at {path}: {source}")]
    StorageInit {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// SQLite engine error
    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PlanboardError {
    /// True for errors caused by the caller rather than the store
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::UnknownDuration(_))
    }
}

/// Result type alias for Planboard operations
pub type Result<T> = std::result::Result<T, PlanboardError>;

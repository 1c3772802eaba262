//! Error types for the object store.

use thiserror::Error;

/// Errors that can occur during object store operations.
///
/// `NotFound` is a distinguished outcome: the integrity checker maps it
/// (and timeouts) to `Unavailable` under the fail-closed rule rather than
/// propagating it.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No object under the requested key.
    #[error("object not found: {0}")]
    NotFound(String),

    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Backend outage or refusal.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

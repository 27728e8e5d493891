//! Common error types for SkyTrack

use thiserror::Error;

/// Common result type for SkyTrack operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across SkyTrack services
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input (malformed address, bad payload, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True when the underlying database rejected a write because the
    /// storage is exhausted (the SQLite analog of a quota-exceeded error).
    pub fn is_storage_full(&self) -> bool {
        match self {
            Error::Database(e) => e.to_string().contains("database or disk is full"),
            _ => false,
        }
    }
}

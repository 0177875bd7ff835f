//! Error types for `tubesub` core library.

use thiserror::Error;

use crate::db::DatabaseError;

/// Result type alias using `tubesub` Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for `tubesub` operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage error
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

//! Error types for Biblio core operations.
//!
//! Business-rule violations each get their own variant so callers can
//! match on the failure kind; backend and parsing problems collapse into
//! `Storage`. The CLI layer maps these to user-facing messages.

use thiserror::Error;

/// Result type alias for Biblio operations.
pub type Result<T> = std::result::Result<T, BiblioError>;

/// Core error type for Biblio operations.
#[derive(Debug, Error)]
pub enum BiblioError {
    /// Unknown book, member, or loan id
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate unique key (ISBN or email)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// No copies available for loan
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// Member is at the loan cap
    #[error("Limit exceeded: {0}")]
    LimitExceeded(String),

    /// Return attempted on a loan that is already closed
    #[error("Already returned: {0}")]
    AlreadyReturned(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Storage backend error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Derived counters disagree with the loan table
    #[error("Integrity error: {0}")]
    Integrity(String),
}

impl From<rusqlite::Error> for BiblioError {
    fn from(err: rusqlite::Error) -> Self {
        BiblioError::Storage(err.to_string())
    }
}

impl From<std::io::Error> for BiblioError {
    fn from(err: std::io::Error) -> Self {
        BiblioError::Storage(err.to_string())
    }
}

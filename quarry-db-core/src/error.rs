//! Error types for quarry-db-core

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type
///
/// `Storage` and `Corrupt` are kept distinct so callers can decide
/// whether a failure is worth retrying: transient I/O may be, a corrupt
/// index never is. Both are fatal to the enclosing transaction.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O failure in a disk-backed store
    #[error("Storage error: {0}")]
    Storage(String),

    /// Persisted state failed validation (bad magic, truncation, ...)
    #[error("Corrupt store: {0}")]
    Corrupt(String),

    /// Unknown term id or dangling internal reference
    #[error("Not found: {0}")]
    NotFound(String),

    /// Serializable commit validation failed
    #[error("Transaction conflict: {0}")]
    Conflict(String),

    /// Transaction state machine misuse
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// Invalid statement (e.g. literal in subject position)
    #[error("Invalid statement: {0}")]
    InvalidStatement(String),
}

impl Error {
    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Error::Storage(msg.into())
    }

    /// Create a corrupt-store error
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Error::Corrupt(msg.into())
    }

    /// Create a not-found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    /// Create a conflict error
    pub fn conflict(msg: impl Into<String>) -> Self {
        Error::Conflict(msg.into())
    }

    /// Create an illegal-state error
    pub fn illegal_state(msg: impl Into<String>) -> Self {
        Error::IllegalState(msg.into())
    }

    /// Create an invalid-statement error
    pub fn invalid_statement(msg: impl Into<String>) -> Self {
        Error::InvalidStatement(msg.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

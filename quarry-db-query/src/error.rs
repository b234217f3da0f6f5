//! Error types for quarry-db-query

use thiserror::Error;

/// Result type alias using QueryError
pub type Result<T> = std::result::Result<T, QueryError>;

/// Expression evaluation error
///
/// Everything except `Fatal` is the recoverable class: Filter treats it
/// as effective-false, Extend leaves the target variable unbound. Only
/// `Fatal` (resource exhaustion) escapes an operator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// Operand kind does not fit the operator (e.g. arithmetic on an IRI)
    #[error("Type error: {0}")]
    Type(String),

    /// A referenced variable has no binding
    #[error("Unbound variable")]
    Unbound,

    /// Division by zero in integer arithmetic
    #[error("Division by zero")]
    DivisionByZero,

    /// Resource exhaustion - aborts the query
    #[error("Fatal evaluation error: {0}")]
    Fatal(String),
}

impl EvalError {
    /// True for the recoverable class (absorbed per row).
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, EvalError::Fatal(_))
    }

    /// Create a type error
    pub fn type_error(msg: impl Into<String>) -> Self {
        EvalError::Type(msg.into())
    }

    /// Create a fatal error
    pub fn fatal(msg: impl Into<String>) -> Self {
        EvalError::Fatal(msg.into())
    }
}

/// Query engine error type
#[derive(Error, Debug)]
pub enum QueryError {
    /// Store-level failure (storage, corruption, unknown term id)
    #[error(transparent)]
    Core(#[from] quarry_db_core::Error),

    /// Non-recoverable evaluation failure
    #[error(transparent)]
    Eval(EvalError),

    /// Malformed algebra tree (e.g. aggregate var colliding with a group key)
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

impl QueryError {
    /// Create an invalid-query error
    pub fn invalid(msg: impl Into<String>) -> Self {
        QueryError::InvalidQuery(msg.into())
    }
}

//! Domain error types
//!
//! Every rule violation is reported explicitly; callers map these onto
//! transport status codes.

use thiserror::Error;

/// Result type for domain rule evaluation
pub type DomainResult<T> = std::result::Result<T, DomainError>;

/// Domain rule violations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// Malformed input (bad interval, missing field, price below floor)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Actor is not allowed to perform the operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Operation conflicts with current state (overlap, already resolved)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Status change not permitted by the lifecycle
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// Balance change would drive a wallet negative
    #[error("Insufficient balance: {0}")]
    InsufficientBalance(String),

    /// Stored value could not be parsed into a domain type
    #[error("Unknown {kind}: {value}")]
    UnknownValue { kind: &'static str, value: String },
}

impl DomainError {
    /// Create a validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a forbidden error
    pub fn forbidden<S: Into<String>>(msg: S) -> Self {
        Self::Forbidden(msg.into())
    }

    /// Create a conflict error
    pub fn conflict<S: Into<String>>(msg: S) -> Self {
        Self::Conflict(msg.into())
    }

    /// Create an insufficient balance error
    pub fn insufficient_balance<S: Into<String>>(msg: S) -> Self {
        Self::InsufficientBalance(msg.into())
    }

    pub(crate) fn unknown(kind: &'static str, value: &str) -> Self {
        Self::UnknownValue {
            kind,
            value: value.to_string(),
        }
    }
}

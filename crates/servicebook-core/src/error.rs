//! Engine error types

use servicebook_db::DbError;
use servicebook_types::DomainError;
use thiserror::Error;

/// Engine operation errors
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error("{0} not found")]
    NotFound(String),

    /// Payment gateway unreachable or returned an error
    #[error("Payment gateway error: {0}")]
    Gateway(String),

    /// Webhook signature missing, malformed, stale or wrong
    #[error("Invalid webhook signature: {0}")]
    Signature(String),

    /// Webhook body could not be understood
    #[error("Invalid webhook payload: {0}")]
    Payload(String),

    /// Notification delivery failed
    #[error("Notification error: {0}")]
    Notify(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CoreError {
    pub fn not_found(what: &str, id: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{} {}", what, id))
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Domain(DomainError::conflict(msg))
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Domain(DomainError::forbidden(msg))
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Domain(DomainError::validation(msg))
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(e: sqlx::Error) -> Self {
        Self::Db(e.into())
    }
}

/// Result type for engine operations
pub type CoreResult<T> = Result<T, CoreError>;

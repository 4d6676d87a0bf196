//! Database error types

use servicebook_types::DomainError;
use thiserror::Error;

/// Database operation errors
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Query error: {0}")]
    Query(sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A stored value does not parse into its domain type
    #[error("Invalid stored data: {0}")]
    InvalidData(String),
}

impl DbError {
    /// Unique or other integrity constraint violation
    pub fn is_integrity_violation(&self) -> bool {
        matches!(self, DbError::Duplicate(_) | DbError::Constraint(_))
    }
}

// SQLSTATE classes surfaced by Postgres for integrity violations
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";
const NOT_NULL_VIOLATION: &str = "23502";

impl From<sqlx::Error> for DbError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e {
            let what = db_err
                .constraint()
                .map(str::to_string)
                .unwrap_or_else(|| db_err.message().to_string());
            match db_err.code().as_deref() {
                Some(UNIQUE_VIOLATION) => return DbError::Duplicate(what),
                Some(FOREIGN_KEY_VIOLATION) | Some(CHECK_VIOLATION) | Some(NOT_NULL_VIOLATION) => {
                    return DbError::Constraint(what)
                }
                _ => {}
            }
        }
        if let sqlx::Error::RowNotFound = e {
            return DbError::NotFound("row".to_string());
        }
        DbError::Query(e)
    }
}

impl From<DomainError> for DbError {
    fn from(e: DomainError) -> Self {
        DbError::InvalidData(e.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        DbError::Migration(e.to_string())
    }
}

/// Result type for database operations
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: DbError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, DbError::NotFound(_)));
        assert!(!err.is_integrity_violation());
    }

    #[test]
    fn test_domain_error_maps_to_invalid_data() {
        let err: DbError = DomainError::validation("bad status").into();
        assert!(matches!(err, DbError::InvalidData(_)));
    }

    #[test]
    fn test_integrity_classification() {
        assert!(DbError::Duplicate("payments_booking_id_key".into()).is_integrity_violation());
        assert!(DbError::Constraint("wallets_pending_balance_check".into()).is_integrity_violation());
        assert!(!DbError::Connection("refused".into()).is_integrity_violation());
    }
}

//! API error handling
//!
//! Every engine error maps onto one HTTP status and a stable numeric code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use servicebook_core::CoreError;
use servicebook_db::DbError;
use servicebook_types::DomainError;
use thiserror::Error;
use utoipa::ToSchema;

/// API result type
pub type ApiResult<T> = Result<T, ApiError>;

/// API error
#[derive(Debug, Error)]
pub enum ApiError {
    // =========================================================================
    // Authentication (1000s)
    // =========================================================================
    #[error("Missing bearer token")]
    MissingToken,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    // =========================================================================
    // Request (2000s)
    // =========================================================================
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Invalid webhook signature")]
    InvalidSignature,

    /// Integrity constraint rejected the write; details stay in the logs
    #[error("Request violates a data integrity constraint")]
    Integrity,

    // =========================================================================
    // State (3000s)
    // =========================================================================
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Insufficient balance: {0}")]
    InsufficientBalance(String),

    // =========================================================================
    // Upstream / internal (5000s)
    // =========================================================================
    #[error("Payment gateway unavailable")]
    Gateway(String),

    #[error("Internal server error")]
    Internal(String),
}

impl ApiError {
    pub fn error_code(&self) -> i32 {
        match self {
            Self::MissingToken => 1001,
            Self::InvalidToken(_) => 1002,
            Self::Forbidden(_) => 1003,

            Self::Validation(_) => 2001,
            Self::BadRequest(_) => 2002,
            Self::InvalidSignature => 2003,
            Self::Integrity => 2004,

            Self::NotFound(_) => 3001,
            Self::Conflict(_) => 3002,
            Self::InsufficientBalance(_) => 3003,

            Self::Gateway(_) => 5002,
            Self::Internal(_) => 5000,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingToken | Self::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Validation(_) | Self::BadRequest(_) | Self::InvalidSignature | Self::Integrity => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::InsufficientBalance(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Gateway(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error body
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub code: i32,
    pub msg: String,
}

impl From<&ApiError> for ErrorResponse {
    fn from(err: &ApiError) -> Self {
        Self {
            code: err.error_code(),
            msg: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(ErrorResponse::from(&self))).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) => Self::Validation(msg),
            DomainError::Forbidden(msg) => Self::Forbidden(msg),
            DomainError::Conflict(msg) => Self::Conflict(msg),
            DomainError::InvalidTransition { from, to } => {
                Self::Conflict(format!("cannot move booking from {} to {}", from, to))
            }
            DomainError::InsufficientBalance(msg) => Self::InsufficientBalance(msg),
            err @ DomainError::UnknownValue { .. } => {
                tracing::error!(error = %err, "Stored value rejected");
                Self::Internal(err.to_string())
            }
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(msg) => Self::NotFound(msg),
            DbError::InvalidInput(msg) => Self::Validation(msg),
            err if err.is_integrity_violation() => {
                tracing::warn!(error = %err, "Integrity violation");
                Self::Integrity
            }
            err => {
                tracing::error!(error = ?err, "Database error");
                Self::Internal(err.to_string())
            }
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Domain(e) => e.into(),
            CoreError::Db(e) => e.into(),
            CoreError::NotFound(what) => Self::NotFound(what),
            CoreError::Gateway(msg) => {
                tracing::error!(error = %msg, "Payment gateway call failed");
                Self::Gateway(msg)
            }
            CoreError::Signature(msg) => {
                tracing::warn!(reason = %msg, "Webhook signature rejected");
                Self::InvalidSignature
            }
            CoreError::Payload(msg) => Self::BadRequest(msg),
            err @ (CoreError::Notify(_) | CoreError::Config(_)) => {
                tracing::error!(error = %err, "Engine error");
                Self::Internal(err.to_string())
            }
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Validation(format_validation_errors(&err))
    }
}

/// Flatten field errors into `field: message` pairs
pub fn format_validation_errors(err: &validator::ValidationErrors) -> String {
    let mut messages: Vec<String> = err
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |e| {
                format!(
                    "{}: {}",
                    field,
                    e.message.as_ref().map(|m| m.as_ref()).unwrap_or("invalid")
                )
            })
        })
        .collect();
    messages.sort();
    messages.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_errors_map_to_taxonomy() {
        let cases = [
            (DomainError::validation("bad"), StatusCode::BAD_REQUEST),
            (DomainError::forbidden("no"), StatusCode::FORBIDDEN),
            (DomainError::conflict("overlap"), StatusCode::CONFLICT),
            (
                DomainError::InvalidTransition {
                    from: "completed".into(),
                    to: "pending".into(),
                },
                StatusCode::CONFLICT,
            ),
            (
                DomainError::insufficient_balance("available"),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status_code(), status);
        }
    }

    #[test]
    fn test_integrity_violation_hides_details() {
        let err = ApiError::from(CoreError::Db(DbError::Constraint(
            "bookings_service_id_fkey".into(),
        )));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(!err.to_string().contains("bookings_service_id_fkey"));
    }

    #[test]
    fn test_gateway_and_signature_errors() {
        assert_eq!(
            ApiError::from(CoreError::Gateway("503".into())).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError::from(CoreError::Signature("stale".into())).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(CoreError::not_found("booking", "x")).status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_error_body() {
        let body = ErrorResponse::from(&ApiError::Conflict("slot taken".into()));
        assert_eq!(body.code, 3002);
        assert_eq!(body.msg, "Conflict: slot taken");
    }
}

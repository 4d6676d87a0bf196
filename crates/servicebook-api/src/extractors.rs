//! Custom Axum Extractors
//!
//! Request extractors for authentication and validation.

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Request},
    http::{header::AUTHORIZATION, request::Parts},
    Json,
};
use serde::de::DeserializeOwned;
use servicebook_types::{Actor, Role};
use std::sync::Arc;

use crate::auth::bearer_token;
use crate::error::{format_validation_errors, ApiError};
use crate::state::AppState;

// =============================================================================
// Authenticated User Extractor
// =============================================================================

/// Caller identity from a verified bearer token
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Actor);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::MissingToken)?;
        let token = bearer_token(header).ok_or(ApiError::MissingToken)?;
        let actor = state.jwt.verify(token)?;
        tracing::Span::current().record("user_id", tracing::field::display(actor.user_id));
        Ok(AuthUser(actor))
    }
}

// =============================================================================
// Admin Required Extractor
// =============================================================================

/// Extractor that requires the admin role
#[derive(Debug, Clone, Copy)]
pub struct RequireAdmin(pub Actor);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequireAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let AuthUser(actor) = AuthUser::from_request_parts(parts, state).await?;
        if actor.role != Role::Admin {
            return Err(ApiError::Forbidden("admin role required".to_string()));
        }
        Ok(RequireAdmin(actor))
    }
}

// =============================================================================
// Validated JSON Extractor
// =============================================================================

/// JSON extractor with validation
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + validator::Validate,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;

        value
            .validate()
            .map_err(|e| ApiError::Validation(format_validation_errors(&e)))?;

        Ok(ValidatedJson(value))
    }
}

//! Bearer token verification
//!
//! Tokens are issued by the external identity service and signed with a
//! shared HS256 secret. The API only verifies them and trusts the
//! `(sub, role)` pair they carry.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use servicebook_types::{Actor, Role};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

/// JWT settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared HS256 secret
    pub jwt_secret: String,
    /// Expected `iss` claim, unchecked when unset
    pub issuer: Option<String>,
    /// Clock skew allowance in seconds
    pub leeway_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            issuer: None,
            leeway_secs: 30,
        }
    }
}

/// Claims read from an access token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub role: Role,
    /// Expiry (unix seconds)
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

impl Claims {
    pub fn new(user_id: Uuid, role: Role, exp: i64) -> Self {
        Self {
            sub: user_id.to_string(),
            role,
            exp,
            iss: None,
        }
    }
}

#[derive(Clone)]
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    encoding_key: EncodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = config.leeway_secs;
        validation.set_required_spec_claims(&["exp", "sub"]);
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }

        Self {
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
        }
    }

    /// Verify a token and return the actor it names
    pub fn verify(&self, token: &str) -> ApiResult<Actor> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| ApiError::InvalidToken(e.to_string()))?;
        let user_id = Uuid::parse_str(&data.claims.sub)
            .map_err(|_| ApiError::InvalidToken("sub is not a user id".to_string()))?;
        Ok(Actor::new(user_id, data.claims.role))
    }

    /// Sign claims with the shared secret. Used by tooling and tests that
    /// stand in for the identity service.
    pub fn issue(&self, claims: &Claims) -> ApiResult<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| ApiError::Internal(format!("Failed to encode token: {}", e)))
    }
}

/// Pull the token out of an `Authorization: Bearer ...` header value
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn verifier() -> JwtVerifier {
        JwtVerifier::new(&AuthConfig {
            jwt_secret: "test-secret-key-at-least-32-bytes-long!!".to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn test_issue_and_verify() {
        let jwt = verifier();
        let user_id = Uuid::new_v4();
        let exp = (Utc::now() + Duration::minutes(5)).timestamp();
        let token = jwt.issue(&Claims::new(user_id, Role::Provider, exp)).unwrap();

        let actor = jwt.verify(&token).unwrap();
        assert_eq!(actor.user_id, user_id);
        assert_eq!(actor.role, Role::Provider);
    }

    #[test]
    fn test_expired_token_rejected() {
        let jwt = verifier();
        let exp = (Utc::now() - Duration::hours(1)).timestamp();
        let token = jwt.issue(&Claims::new(Uuid::new_v4(), Role::Client, exp)).unwrap();
        assert!(matches!(jwt.verify(&token), Err(ApiError::InvalidToken(_))));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let exp = (Utc::now() + Duration::minutes(5)).timestamp();
        let other = JwtVerifier::new(&AuthConfig {
            jwt_secret: "a-completely-different-signing-secret".to_string(),
            ..Default::default()
        });
        let token = other.issue(&Claims::new(Uuid::new_v4(), Role::Admin, exp)).unwrap();
        assert!(verifier().verify(&token).is_err());
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("bearer  abc "), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("abc"), None);
    }
}

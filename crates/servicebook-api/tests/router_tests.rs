//! Router Tests
//!
//! Authentication, authorization, validation and webhook rejection paths.
//! Each of these is decided before the engine touches the database, so the
//! state is built over a lazily-connected pool that never connects.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use servicebook_api::{create_test_router, AppState, AuthConfig, Claims, JwtVerifier};
use servicebook_core::payments::compute_signature;
use servicebook_core::{Engine, EngineConfig, IdentityMapping, SchemaResolver, TracingNotifier};
use servicebook_db::Database;
use servicebook_types::Role;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

const JWT_SECRET: &str = "router-test-secret-at-least-32-bytes!!";
const WEBHOOK_SECRET: &str = "whsec_router_test";

fn create_router() -> Router {
    let db = Database::lazy("postgresql://servicebook@127.0.0.1:1/servicebook").unwrap();
    let mut config = EngineConfig::default();
    config.payments.webhook_secret = WEBHOOK_SECRET.to_string();
    let engine = Engine::with_defaults(
        db,
        config,
        SchemaResolver::new(IdentityMapping::Direct),
        Arc::new(TracingNotifier),
    )
    .unwrap();
    let jwt = JwtVerifier::new(&AuthConfig {
        jwt_secret: JWT_SECRET.to_string(),
        ..Default::default()
    });
    create_test_router(Arc::new(AppState::new(engine, jwt)))
}

fn token(role: Role) -> String {
    let exp = (Utc::now() + Duration::minutes(10)).timestamp();
    JwtVerifier::new(&AuthConfig {
        jwt_secret: JWT_SECRET.to_string(),
        ..Default::default()
    })
    .issue(&Claims::new(Uuid::new_v4(), role, exp))
    .unwrap()
}

/// Make a request and get the status and JSON body
async fn json_request(
    router: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");
    if let Some(token) = token {
        request = request.header("Authorization", format!("Bearer {}", token));
    }

    let body = match body {
        Some(json_body) => Body::from(serde_json::to_vec(&json_body).unwrap()),
        None => Body::empty(),
    };

    let response = router.clone().oneshot(request.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(json!(null)))
}

async fn webhook_request(router: &Router, body: &str, signature: Option<String>) -> (StatusCode, Value) {
    let mut request = Request::builder()
        .method("POST")
        .uri("/api/v1/payments/webhook")
        .header("Content-Type", "application/json");
    if let Some(signature) = signature {
        request = request.header("signature", signature);
    }
    let response = router
        .clone()
        .oneshot(request.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(json!(null)))
}

fn booking_body(price: &str) -> Value {
    json!({
        "service_id": Uuid::new_v4(),
        "start_time": "2025-01-10T10:00:00Z",
        "total_price": price
    })
}

// =============================================================================
// Authentication
// =============================================================================

mod authentication {
    use super::*;

    #[tokio::test]
    async fn test_health_needs_no_token() {
        let router = create_router();
        let (status, json) = json_request(&router, "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "healthy");
    }

    #[tokio::test]
    async fn test_missing_token() {
        let router = create_router();
        let (status, json) =
            json_request(&router, "POST", "/api/v1/bookings", None, Some(booking_body("10"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["code"], 1001);
    }

    #[tokio::test]
    async fn test_garbage_token() {
        let router = create_router();
        let (status, json) =
            json_request(&router, "GET", "/api/v1/bookings", Some("not-a-jwt"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["code"], 1002);
    }

    #[tokio::test]
    async fn test_expired_token() {
        let router = create_router();
        let exp = (Utc::now() - Duration::hours(2)).timestamp();
        let expired = JwtVerifier::new(&AuthConfig {
            jwt_secret: JWT_SECRET.to_string(),
            ..Default::default()
        })
        .issue(&Claims::new(Uuid::new_v4(), Role::Client, exp))
        .unwrap();

        let (status, _) = json_request(&router, "GET", "/api/v1/bookings", Some(&expired), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}

// =============================================================================
// Authorization
// =============================================================================

mod authorization {
    use super::*;

    #[tokio::test]
    async fn test_delete_requires_admin() {
        let router = create_router();
        let uri = format!("/api/v1/bookings/{}", Uuid::new_v4());
        let (status, json) =
            json_request(&router, "DELETE", &uri, Some(&token(Role::Provider)), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["code"], 1003);
    }

    #[tokio::test]
    async fn test_resolve_dispute_requires_admin() {
        let router = create_router();
        let uri = format!("/api/v1/bookings/{}/resolve-dispute", Uuid::new_v4());
        let body = json!({ "resolution": "refund", "favor": "client" });
        let (status, _) =
            json_request(&router, "PUT", &uri, Some(&token(Role::Client)), Some(body)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_wallet_is_provider_only() {
        let router = create_router();
        let (status, _) =
            json_request(&router, "GET", "/api/v1/wallet", Some(&token(Role::Client)), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_providers_cannot_create_bookings() {
        let router = create_router();
        let (status, _) = json_request(
            &router,
            "POST",
            "/api/v1/bookings",
            Some(&token(Role::Provider)),
            Some(booking_body("10")),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}

// =============================================================================
// Validation
// =============================================================================

mod validation {
    use super::*;

    #[tokio::test]
    async fn test_negative_price() {
        let router = create_router();
        let (status, json) = json_request(
            &router,
            "POST",
            "/api/v1/bookings",
            Some(&token(Role::Client)),
            Some(booking_body("-5")),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], 2001);
    }

    #[tokio::test]
    async fn test_end_before_start() {
        let router = create_router();
        let body = json!({
            "service_id": Uuid::new_v4(),
            "start_time": "2025-01-10T10:00:00Z",
            "end_time": "2025-01-10T09:00:00Z",
            "total_price": "10"
        });
        let (status, _) =
            json_request(&router, "POST", "/api/v1/bookings", Some(&token(Role::Client)), Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_status() {
        let router = create_router();
        let uri = format!("/api/v1/bookings/{}", Uuid::new_v4());
        let (status, json) = json_request(
            &router,
            "PUT",
            &uri,
            Some(&token(Role::Provider)),
            Some(json!({ "status": "teleported" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], 2002);
    }

    #[tokio::test]
    async fn test_complete_without_evidence() {
        let router = create_router();
        let uri = format!("/api/v1/bookings/{}/complete", Uuid::new_v4());
        let (status, _) = json_request(
            &router,
            "POST",
            &uri,
            Some(&token(Role::Provider)),
            Some(json!({ "evidence": [] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_attach_without_method() {
        let router = create_router();
        let body = json!({ "booking_id": Uuid::new_v4(), "payment_method_id": "" });
        let (status, _) = json_request(
            &router,
            "POST",
            "/api/v1/payments/attach-method",
            Some(&token(Role::Client)),
            Some(body),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

// =============================================================================
// Payment webhook
// =============================================================================

mod webhook {
    use super::*;

    const IGNORED_EVENT: &str = r#"{"type":"charge.refunded","data":{"object":{"id":"ch_1"}}}"#;

    fn sign(body: &str, timestamp: i64) -> String {
        let sig = compute_signature(WEBHOOK_SECRET, timestamp, body.as_bytes()).unwrap();
        format!("t={},v1={}", timestamp, sig)
    }

    #[tokio::test]
    async fn test_missing_signature() {
        let router = create_router();
        let (status, json) = webhook_request(&router, IGNORED_EVENT, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], 2003);
    }

    #[tokio::test]
    async fn test_tampered_body() {
        let router = create_router();
        let signature = sign(IGNORED_EVENT, Utc::now().timestamp());
        let tampered = IGNORED_EVENT.replace("ch_1", "ch_2");
        let (status, _) = webhook_request(&router, &tampered, Some(signature)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_stale_timestamp() {
        let router = create_router();
        let signature = sign(IGNORED_EVENT, Utc::now().timestamp() - 3600);
        let (status, _) = webhook_request(&router, IGNORED_EVENT, Some(signature)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_signed_unhandled_event_is_acknowledged() {
        let router = create_router();
        let signature = sign(IGNORED_EVENT, Utc::now().timestamp());
        let (status, json) = webhook_request(&router, IGNORED_EVENT, Some(signature)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["received"], true);
        assert_eq!(json["outcome"], "ignored");
    }
}

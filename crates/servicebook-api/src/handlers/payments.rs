//! Payment Handlers
//!
//! Intent creation, method attachment, confirmation and the gateway webhook.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::dto::{
    AttachMethodRequest, BookingPaymentRequest, PaymentIntentResponse, PaymentResponse, WebhookAck,
};
use crate::error::ApiResult;
use crate::extractors::{AuthUser, ValidatedJson};
use crate::state::AppState;

/// Header carrying `t={ts},v1={hmac}`
pub const SIGNATURE_HEADER: &str = "signature";

/// Create or reuse the payment intent for a booking
#[utoipa::path(
    post,
    path = "/api/v1/payments/create-intent",
    tag = "Payments",
    request_body = BookingPaymentRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Intent ready for the client", body = PaymentIntentResponse),
        (status = 409, description = "Booking not payable or already paid"),
        (status = 502, description = "Gateway unavailable")
    )
)]
pub async fn create_intent(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    ValidatedJson(request): ValidatedJson<BookingPaymentRequest>,
) -> ApiResult<Json<PaymentIntentResponse>> {
    let intent = state.engine.payments.create_intent(actor, request.booking_id).await?;
    Ok(Json(intent.into()))
}

#[utoipa::path(
    post,
    path = "/api/v1/payments/attach-method",
    tag = "Payments",
    request_body = AttachMethodRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Payment after attachment", body = PaymentResponse),
        (status = 502, description = "Gateway unavailable")
    )
)]
pub async fn attach_method(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    ValidatedJson(request): ValidatedJson<AttachMethodRequest>,
) -> ApiResult<Json<PaymentResponse>> {
    let payment = state
        .engine
        .payments
        .attach_method(actor, request.booking_id, &request.payment_method_id)
        .await?;
    Ok(Json(payment.into()))
}

/// Re-read the intent from the gateway and apply its status
#[utoipa::path(
    post,
    path = "/api/v1/payments/confirm",
    tag = "Payments",
    request_body = BookingPaymentRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Payment after confirmation", body = PaymentResponse),
        (status = 502, description = "Gateway unavailable")
    )
)]
pub async fn confirm_payment(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    ValidatedJson(request): ValidatedJson<BookingPaymentRequest>,
) -> ApiResult<Json<PaymentResponse>> {
    let payment = state.engine.payments.confirm(actor, request.booking_id).await?;
    Ok(Json(payment.into()))
}

/// Gateway webhook; authenticated by signature, not by token
#[utoipa::path(
    post,
    path = "/api/v1/payments/webhook",
    tag = "Payments",
    params(("signature" = String, Header, description = "t={timestamp},v1={hex hmac}")),
    request_body(content = String, description = "Raw gateway event JSON"),
    responses(
        (status = 200, description = "Event accepted", body = WebhookAck),
        (status = 400, description = "Bad signature or payload")
    )
)]
pub async fn webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookAck>> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    let outcome = state.engine.payments.handle_webhook(&body, signature).await?;
    Ok(Json(outcome.into()))
}

#[utoipa::path(
    get,
    path = "/api/v1/payments/{id}",
    tag = "Payments",
    params(("id" = Uuid, Path, description = "Payment id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Payment", body = PaymentResponse),
        (status = 403, description = "Not a participant"),
        (status = 404, description = "Unknown payment")
    )
)]
pub async fn get_payment(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PaymentResponse>> {
    let payment = state.engine.payments.get_payment(actor, id).await?;
    Ok(Json(payment.into()))
}

//! Payment DTOs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use servicebook_core::{PaymentIntent, WebhookOutcome};
use servicebook_db::DbPayment;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Booking reference for create-intent and confirm
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct BookingPaymentRequest {
    pub booking_id: Uuid,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct AttachMethodRequest {
    pub booking_id: Uuid,
    #[validate(length(min = 1, max = 255, message = "payment_method_id is required"))]
    pub payment_method_id: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaymentIntentResponse {
    pub payment_id: Uuid,
    pub booking_id: Uuid,
    pub gateway_intent_id: Option<String>,
    pub client_secret: Option<String>,
    pub status: String,
    #[schema(value_type = String, example = "1000.00")]
    pub gross_amount: Decimal,
    #[schema(value_type = String, example = "150.00")]
    pub commission_amount: Decimal,
    #[schema(value_type = String, example = "850.00")]
    pub net_provider_amount: Decimal,
    /// An in-flight intent was returned instead of a new one
    pub reused: bool,
}

impl From<PaymentIntent> for PaymentIntentResponse {
    fn from(p: PaymentIntent) -> Self {
        Self {
            payment_id: p.payment_id,
            booking_id: p.booking_id,
            gateway_intent_id: p.gateway_intent_id,
            client_secret: p.client_secret,
            status: p.status.as_str().to_string(),
            gross_amount: p.gross_amount,
            commission_amount: p.commission_amount,
            net_provider_amount: p.net_provider_amount,
            reused: p.reused,
        }
    }
}

/// Payment record; the client secret is never echoed here
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub client_id: Uuid,
    pub provider_id: Uuid,
    #[schema(value_type = String)]
    pub gross_amount: Decimal,
    #[schema(value_type = String)]
    pub commission_rate: Decimal,
    #[schema(value_type = String)]
    pub commission_amount: Decimal,
    #[schema(value_type = String)]
    pub net_provider_amount: Decimal,
    #[schema(value_type = String)]
    pub refunded_amount: Decimal,
    pub status: String,
    pub gateway_intent_id: Option<String>,
    pub payment_method_id: Option<String>,
    pub failure_reason: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbPayment> for PaymentResponse {
    fn from(p: DbPayment) -> Self {
        Self {
            id: p.id,
            booking_id: p.booking_id,
            client_id: p.client_id,
            provider_id: p.provider_id,
            gross_amount: p.gross_amount,
            commission_rate: p.commission_rate,
            commission_amount: p.commission_amount,
            net_provider_amount: p.net_provider_amount,
            refunded_amount: p.refunded_amount,
            status: p.status,
            gateway_intent_id: p.gateway_intent_id,
            payment_method_id: p.payment_method_id,
            failure_reason: p.failure_reason,
            paid_at: p.paid_at,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WebhookAck {
    pub received: bool,
    /// `applied` or `ignored`
    pub outcome: String,
}

impl From<WebhookOutcome> for WebhookAck {
    fn from(outcome: WebhookOutcome) -> Self {
        let outcome = match outcome {
            WebhookOutcome::Applied => "applied",
            WebhookOutcome::Ignored => "ignored",
        };
        Self {
            received: true,
            outcome: outcome.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attach_requires_method_id() {
        let req = AttachMethodRequest {
            booking_id: Uuid::nil(),
            payment_method_id: String::new(),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_webhook_ack() {
        let ack = WebhookAck::from(WebhookOutcome::Ignored);
        assert!(ack.received);
        assert_eq!(ack.outcome, "ignored");
    }
}

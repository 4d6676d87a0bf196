//! OpenAPI Documentation

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::OpenApi;

use crate::dto;
use crate::error::ErrorResponse;
use crate::handlers;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Servicebook API",
        description = "Bookings, escrowed payments, disputes and provider wallets.",
        version = "1.0.0"
    ),
    paths(
        // Health
        handlers::health::health_check,
        handlers::health::readiness_check,
        // Bookings
        handlers::bookings::create_booking,
        handlers::bookings::list_bookings,
        handlers::bookings::get_booking,
        handlers::bookings::update_booking_status,
        handlers::bookings::delete_booking,
        handlers::bookings::reschedule_booking,
        // Completion
        handlers::bookings::complete_booking,
        handlers::bookings::list_evidence,
        handlers::bookings::confirm_booking,
        // Disputes
        handlers::bookings::list_disputed,
        handlers::bookings::resolve_dispute,
        handlers::bookings::dispute_audit,
        // Payments
        handlers::payments::create_intent,
        handlers::payments::attach_method,
        handlers::payments::confirm_payment,
        handlers::payments::webhook,
        handlers::payments::get_payment,
        // Wallet
        handlers::wallet::get_wallet,
        handlers::wallet::list_transactions,
        handlers::wallet::adjust_wallet,
    ),
    components(
        schemas(
            ErrorResponse,
            handlers::health::HealthResponse,
            handlers::health::ReadinessResponse,
            handlers::health::ComponentStatus,
            dto::SuccessResponse,
            // Bookings
            dto::CreateBookingRequest,
            dto::UpdateBookingRequest,
            dto::RescheduleRequest,
            dto::EvidenceItem,
            dto::CompleteBookingRequest,
            dto::ConfirmBookingRequest,
            dto::ResolveDisputeRequest,
            dto::BookingResponse,
            dto::EvidenceResponse,
            dto::CompleteBookingResponse,
            dto::DisputeAuditResponse,
            // Payments
            dto::BookingPaymentRequest,
            dto::AttachMethodRequest,
            dto::PaymentIntentResponse,
            dto::PaymentResponse,
            dto::WebhookAck,
            // Wallet
            dto::WalletResponse,
            dto::WalletTransactionResponse,
            dto::AdjustWalletRequest,
        )
    ),
    tags(
        (name = "Health", description = "Service health and status"),
        (name = "Bookings", description = "Booking lifecycle"),
        (name = "Completion", description = "Completion evidence and client confirmation"),
        (name = "Disputes", description = "Dispute review and resolution"),
        (name = "Payments", description = "Payment intents and gateway webhook"),
        (name = "Wallet", description = "Provider escrow wallet")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Security scheme modifier
pub struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = &mut openapi.components {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_generation() {
        let spec = ApiDoc::openapi();
        assert_eq!(spec.info.title, "Servicebook API");
        assert!(spec.paths.paths.contains_key("/api/v1/bookings/{id}/resolve-dispute"));
        assert!(spec.paths.paths.contains_key("/api/v1/payments/webhook"));
    }
}

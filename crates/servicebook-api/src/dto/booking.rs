//! Booking DTOs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use servicebook_core::{
    CompleteBooking, ConfirmBooking, CreateBooking, EvidenceInput, RescheduleBooking,
    ResolveDispute, UpdateStatus,
};
use servicebook_db::{DbBooking, DbDisputeAudit, DbEvidence};
use servicebook_types::{BookingMode, BookingStatus, DisputeFavor, EvidenceType};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() {
        let mut err = ValidationError::new("non_negative");
        err.message = Some("must not be negative".into());
        return Err(err);
    }
    Ok(())
}

// =============================================================================
// Requests
// =============================================================================

/// Create booking request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBookingRequest {
    pub service_id: Uuid,
    /// Must own the service when given
    pub provider_id: Option<Uuid>,
    pub start_time: DateTime<Utc>,
    /// Derived from the service duration when omitted
    pub end_time: Option<DateTime<Utc>>,
    #[validate(custom(function = "non_negative"))]
    #[schema(value_type = String, example = "120.00")]
    pub total_price: Decimal,
    #[serde(default)]
    #[schema(value_type = String, example = "request")]
    pub booking_mode: BookingMode,
    #[validate(length(max = 2000, message = "notes must be at most 2000 characters"))]
    pub notes: Option<String>,
}

impl From<CreateBookingRequest> for CreateBooking {
    fn from(req: CreateBookingRequest) -> Self {
        Self {
            provider_id: req.provider_id,
            service_id: req.service_id,
            start: req.start_time,
            end: req.end_time,
            total_price: req.total_price,
            mode: req.booking_mode,
            notes: req.notes,
        }
    }
}

/// Status change request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateBookingRequest {
    #[schema(value_type = String, example = "accepted")]
    pub status: BookingStatus,
    #[validate(length(max = 1000, message = "reason must be at most 1000 characters"))]
    pub reason: Option<String>,
}

impl From<UpdateBookingRequest> for UpdateStatus {
    fn from(req: UpdateBookingRequest) -> Self {
        Self {
            status: req.status,
            reason: req.reason,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RescheduleRequest {
    pub start_time: DateTime<Utc>,
    /// Keeps the current duration when omitted
    pub end_time: Option<DateTime<Utc>>,
    #[validate(length(max = 1000, message = "reason must be at most 1000 characters"))]
    pub reason: Option<String>,
}

impl From<RescheduleRequest> for RescheduleBooking {
    fn from(req: RescheduleRequest) -> Self {
        Self {
            start: req.start_time,
            end: req.end_time,
            reason: req.reason,
        }
    }
}

/// Evidence file already stored by the upload service
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EvidenceItem {
    #[serde(default)]
    #[schema(value_type = String, example = "after")]
    pub evidence_type: EvidenceType,
    pub file_url: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CompleteBookingRequest {
    #[validate(length(min = 1, message = "at least one evidence file is required"))]
    pub evidence: Vec<EvidenceItem>,
    #[validate(length(max = 2000, message = "notes must be at most 2000 characters"))]
    pub notes: Option<String>,
}

impl From<CompleteBookingRequest> for CompleteBooking {
    fn from(req: CompleteBookingRequest) -> Self {
        Self {
            evidence: req
                .evidence
                .into_iter()
                .map(|e| EvidenceInput {
                    evidence_type: e.evidence_type,
                    file_url: e.file_url,
                    description: e.description,
                })
                .collect(),
            notes: req.notes,
        }
    }
}

/// Client confirmation; `confirmed = false` raises a dispute
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ConfirmBookingRequest {
    pub confirmed: bool,
    #[validate(length(max = 2000, message = "reason must be at most 2000 characters"))]
    pub reason: Option<String>,
}

impl From<ConfirmBookingRequest> for ConfirmBooking {
    fn from(req: ConfirmBookingRequest) -> Self {
        Self {
            confirmed: req.confirmed,
            reason: req.reason,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ResolveDisputeRequest {
    #[validate(length(min = 1, max = 2000, message = "resolution is required"))]
    pub resolution: String,
    #[schema(value_type = String, example = "client")]
    pub favor: DisputeFavor,
    /// 0-100; defaults to 100 for the client and 0 for the provider
    #[schema(value_type = Option<String>, example = "50")]
    pub refund_percentage: Option<Decimal>,
}

impl From<ResolveDisputeRequest> for ResolveDispute {
    fn from(req: ResolveDisputeRequest) -> Self {
        Self {
            resolution: req.resolution,
            favor: req.favor,
            refund_percentage: req.refund_percentage,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListBookingsQuery {
    /// Filter by status
    #[param(value_type = Option<String>)]
    pub status: Option<BookingStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

// =============================================================================
// Responses
// =============================================================================

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BookingResponse {
    pub id: Uuid,
    pub client_id: Uuid,
    pub provider_id: Uuid,
    pub service_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: String,
    pub booking_mode: String,
    #[schema(value_type = String)]
    pub total_price: Decimal,
    pub notes: Option<String>,
    pub payment_status: Option<String>,
    pub cancellation_reason: Option<String>,
    pub provider_completed_at: Option<DateTime<Utc>>,
    pub completion_notes: Option<String>,
    pub client_confirmed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub dispute_raised: bool,
    pub dispute_reason: Option<String>,
    pub dispute_resolution: Option<String>,
    pub dispute_resolved_at: Option<DateTime<Utc>>,
    pub original_start: Option<DateTime<Utc>>,
    pub original_end: Option<DateTime<Utc>>,
    pub reschedule_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbBooking> for BookingResponse {
    fn from(b: DbBooking) -> Self {
        Self {
            id: b.id,
            client_id: b.client_id,
            provider_id: b.provider_id,
            service_id: b.service_id,
            start_time: b.start_time,
            end_time: b.end_time,
            status: b.status,
            booking_mode: b.booking_mode,
            total_price: b.total_price,
            notes: b.notes,
            payment_status: b.payment_status,
            cancellation_reason: b.cancellation_reason,
            provider_completed_at: b.provider_completed_at,
            completion_notes: b.completion_notes,
            client_confirmed_at: b.client_confirmed_at,
            completed_at: b.completed_at,
            dispute_raised: b.dispute_raised,
            dispute_reason: b.dispute_reason,
            dispute_resolution: b.dispute_resolution,
            dispute_resolved_at: b.dispute_resolved_at,
            original_start: b.original_start,
            original_end: b.original_end,
            reschedule_count: b.reschedule_count,
            created_at: b.created_at,
            updated_at: b.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EvidenceResponse {
    pub id: Uuid,
    pub evidence_type: String,
    pub file_url: String,
    pub description: Option<String>,
    pub uploaded_by: Uuid,
    pub uploaded_at: DateTime<Utc>,
}

impl From<DbEvidence> for EvidenceResponse {
    fn from(e: DbEvidence) -> Self {
        Self {
            id: e.id,
            evidence_type: e.evidence_type,
            file_url: e.file_url,
            description: e.description,
            uploaded_by: e.uploaded_by,
            uploaded_at: e.uploaded_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CompleteBookingResponse {
    pub booking: BookingResponse,
    pub evidence: Vec<EvidenceResponse>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DisputeAuditResponse {
    pub id: Uuid,
    pub payment_id: Option<Uuid>,
    /// Empty for automatic resolutions
    pub resolved_by: Option<Uuid>,
    pub favor: String,
    #[schema(value_type = String)]
    pub refund_percentage: Decimal,
    #[schema(value_type = String)]
    pub refund_amount: Decimal,
    #[schema(value_type = String)]
    pub release_amount: Decimal,
    pub resolution: String,
    pub automatic: bool,
    pub created_at: DateTime<Utc>,
}

impl From<DbDisputeAudit> for DisputeAuditResponse {
    fn from(a: DbDisputeAudit) -> Self {
        Self {
            id: a.id,
            payment_id: a.payment_id,
            resolved_by: a.resolved_by,
            favor: a.favor,
            refund_percentage: a.refund_percentage,
            refund_amount: a.refund_amount,
            release_amount: a.release_amount,
            resolution: a.resolution,
            automatic: a.automatic,
            created_at: a.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_request_defaults_to_request_mode() {
        let req: CreateBookingRequest = serde_json::from_value(json!({
            "service_id": Uuid::nil(),
            "start_time": "2025-01-10T10:00:00Z",
            "total_price": "120.00"
        }))
        .unwrap();
        assert_eq!(req.booking_mode, BookingMode::Request);
        assert!(req.validate().is_ok());

        let input = CreateBooking::from(req);
        assert!(input.end.is_none());
        assert_eq!(input.mode, BookingMode::Request);
    }

    #[test]
    fn test_negative_price_rejected() {
        let req: CreateBookingRequest = serde_json::from_value(json!({
            "service_id": Uuid::nil(),
            "start_time": "2025-01-10T10:00:00Z",
            "total_price": "-1"
        }))
        .unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_complete_requires_evidence() {
        let req: CompleteBookingRequest =
            serde_json::from_value(json!({ "evidence": [] })).unwrap();
        assert!(req.validate().is_err());

        let req: CompleteBookingRequest = serde_json::from_value(json!({
            "evidence": [{ "file_url": "https://files.test/a.jpg" }]
        }))
        .unwrap();
        assert!(req.validate().is_ok());
        assert_eq!(req.evidence[0].evidence_type, EvidenceType::Other);
    }

    #[test]
    fn test_unknown_status_is_a_parse_error() {
        let parsed = serde_json::from_value::<UpdateBookingRequest>(json!({ "status": "teleported" }));
        assert!(parsed.is_err());
    }
}

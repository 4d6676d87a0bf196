//! Booking Handlers
//!
//! Lifecycle endpoints: creation, status changes, rescheduling, completion
//! with evidence, client confirmation and dispute resolution.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use servicebook_core::Page;
use std::sync::Arc;
use uuid::Uuid;

use crate::dto::{
    BookingResponse, CompleteBookingRequest, CompleteBookingResponse, ConfirmBookingRequest,
    CreateBookingRequest, DisputeAuditResponse, EvidenceResponse, ListBookingsQuery, PageQuery,
    RescheduleRequest, ResolveDisputeRequest, SuccessResponse, UpdateBookingRequest,
};
use crate::error::ApiResult;
use crate::extractors::{AuthUser, RequireAdmin, ValidatedJson};
use crate::state::AppState;

/// Create a booking
#[utoipa::path(
    post,
    path = "/api/v1/bookings",
    tag = "Bookings",
    request_body = CreateBookingRequest,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Booking created", body = BookingResponse),
        (status = 400, description = "Invalid interval, price or service"),
        (status = 404, description = "Unknown service"),
        (status = 409, description = "Provider already booked or date blocked")
    )
)]
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    ValidatedJson(request): ValidatedJson<CreateBookingRequest>,
) -> ApiResult<(StatusCode, Json<BookingResponse>)> {
    let booking = state.engine.bookings.create(actor, request.into()).await?;
    Ok((StatusCode::CREATED, Json(booking.into())))
}

/// List the caller's bookings
#[utoipa::path(
    get,
    path = "/api/v1/bookings",
    tag = "Bookings",
    params(ListBookingsQuery),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Bookings, newest start first", body = [BookingResponse])
    )
)]
pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Query(query): Query<ListBookingsQuery>,
) -> ApiResult<Json<Vec<BookingResponse>>> {
    let page = Page::new(query.limit, query.offset);
    let bookings = state.engine.bookings.list_mine(actor, query.status, page).await?;
    Ok(Json(bookings.into_iter().map(Into::into).collect()))
}

/// Open and resolved disputes (admin)
#[utoipa::path(
    get,
    path = "/api/v1/bookings/disputed",
    tag = "Disputes",
    params(PageQuery),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Disputed bookings", body = [BookingResponse]),
        (status = 403, description = "Admin role required")
    )
)]
pub async fn list_disputed(
    State(state): State<Arc<AppState>>,
    RequireAdmin(actor): RequireAdmin,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Vec<BookingResponse>>> {
    let bookings = state.engine.bookings.list_disputed(actor, query.page()).await?;
    Ok(Json(bookings.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/api/v1/bookings/{id}",
    tag = "Bookings",
    params(("id" = Uuid, Path, description = "Booking id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Booking", body = BookingResponse),
        (status = 403, description = "Not a participant"),
        (status = 404, description = "Unknown booking")
    )
)]
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<BookingResponse>> {
    let booking = state.engine.bookings.get(actor, id).await?;
    Ok(Json(booking.into()))
}

/// Accept, reject, cancel or reconfirm
#[utoipa::path(
    put,
    path = "/api/v1/bookings/{id}",
    tag = "Bookings",
    params(("id" = Uuid, Path, description = "Booking id")),
    request_body = UpdateBookingRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Updated booking", body = BookingResponse),
        (status = 409, description = "Transition not allowed")
    )
)]
pub async fn update_booking_status(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateBookingRequest>,
) -> ApiResult<Json<BookingResponse>> {
    let booking = state.engine.bookings.update_status(actor, id, request.into()).await?;
    Ok(Json(booking.into()))
}

/// Delete a booking without a captured payment (admin)
#[utoipa::path(
    delete,
    path = "/api/v1/bookings/{id}",
    tag = "Bookings",
    params(("id" = Uuid, Path, description = "Booking id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Deleted", body = SuccessResponse),
        (status = 409, description = "Payment already captured")
    )
)]
pub async fn delete_booking(
    State(state): State<Arc<AppState>>,
    RequireAdmin(actor): RequireAdmin,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SuccessResponse>> {
    state.engine.bookings.delete(actor, id).await?;
    Ok(Json(SuccessResponse::with_message("Booking deleted")))
}

#[utoipa::path(
    put,
    path = "/api/v1/bookings/{id}/reschedule",
    tag = "Bookings",
    params(("id" = Uuid, Path, description = "Booking id")),
    request_body = RescheduleRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Rescheduled booking", body = BookingResponse),
        (status = 409, description = "Slot taken, wrong status or limit reached")
    )
)]
pub async fn reschedule_booking(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<RescheduleRequest>,
) -> ApiResult<Json<BookingResponse>> {
    let booking = state.engine.bookings.reschedule(actor, id, request.into()).await?;
    Ok(Json(booking.into()))
}

/// Provider reports completion with evidence
#[utoipa::path(
    post,
    path = "/api/v1/bookings/{id}/complete",
    tag = "Completion",
    params(("id" = Uuid, Path, description = "Booking id")),
    request_body = CompleteBookingRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Awaiting client confirmation", body = CompleteBookingResponse),
        (status = 400, description = "No evidence supplied")
    )
)]
pub async fn complete_booking(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<CompleteBookingRequest>,
) -> ApiResult<Json<CompleteBookingResponse>> {
    let (booking, evidence) = state
        .engine
        .bookings
        .complete_with_evidence(actor, id, request.into())
        .await?;
    Ok(Json(CompleteBookingResponse {
        booking: booking.into(),
        evidence: evidence.into_iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/bookings/{id}/evidence",
    tag = "Completion",
    params(("id" = Uuid, Path, description = "Booking id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Evidence files", body = [EvidenceResponse])
    )
)]
pub async fn list_evidence(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<EvidenceResponse>>> {
    let evidence = state.engine.bookings.list_evidence(actor, id).await?;
    Ok(Json(evidence.into_iter().map(Into::into).collect()))
}

/// Client confirms completion or raises a dispute
#[utoipa::path(
    put,
    path = "/api/v1/bookings/{id}/confirm",
    tag = "Completion",
    params(("id" = Uuid, Path, description = "Booking id")),
    request_body = ConfirmBookingRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Completed or disputed booking", body = BookingResponse),
        (status = 400, description = "Dispute reason too short"),
        (status = 409, description = "Not awaiting confirmation")
    )
)]
pub async fn confirm_booking(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<ConfirmBookingRequest>,
) -> ApiResult<Json<BookingResponse>> {
    let booking = state.engine.bookings.confirm(actor, id, request.into()).await?;
    Ok(Json(booking.into()))
}

/// Settle a dispute (admin)
#[utoipa::path(
    put,
    path = "/api/v1/bookings/{id}/resolve-dispute",
    tag = "Disputes",
    params(("id" = Uuid, Path, description = "Booking id")),
    request_body = ResolveDisputeRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Resolved booking", body = BookingResponse),
        (status = 409, description = "Not disputed or already resolved")
    )
)]
pub async fn resolve_dispute(
    State(state): State<Arc<AppState>>,
    RequireAdmin(actor): RequireAdmin,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<ResolveDisputeRequest>,
) -> ApiResult<Json<BookingResponse>> {
    let booking = state.engine.disputes.resolve(actor, id, request.into()).await?;
    Ok(Json(booking.into()))
}

/// Resolution history (admin)
#[utoipa::path(
    get,
    path = "/api/v1/bookings/{id}/dispute-audit",
    tag = "Disputes",
    params(("id" = Uuid, Path, description = "Booking id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Audit entries", body = [DisputeAuditResponse])
    )
)]
pub async fn dispute_audit(
    State(state): State<Arc<AppState>>,
    RequireAdmin(actor): RequireAdmin,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<DisputeAuditResponse>>> {
    let entries = state.engine.disputes.audit_log(actor, id).await?;
    Ok(Json(entries.into_iter().map(Into::into).collect()))
}

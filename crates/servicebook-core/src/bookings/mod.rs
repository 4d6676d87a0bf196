//! Booking lifecycle
//!
//! Status changes that touch the provider's schedule (create, accept,
//! reschedule, cancel) run under the provider's advisory lock; the others
//! only row-lock the booking.

mod completion;
mod reschedule;

pub use completion::{CompleteBooking, ConfirmBooking, EvidenceInput};
pub use reschedule::RescheduleBooking;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use servicebook_db::{
    BookingRepo, DbBooking, DbEvidence, EvidenceRepo, NewBooking, PaymentRepo, PgTx, ProviderLock,
};
use servicebook_types::{
    check_price_floor, Actor, BookingMode, BookingStatus, DomainError, Interval, Party,
    PaymentStatus, Role, SettlementSplit,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::engine::EngineContext;
use crate::ledger::EscrowLedger;
use crate::notify::{NotificationKind, SideEffects};
use crate::scheduler::ConflictScheduler;
use crate::{metrics, CoreError, CoreResult};

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// New booking request from a client
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBooking {
    /// Provider reference; must own the service when given
    pub provider_id: Option<Uuid>,
    pub service_id: Uuid,
    pub start: DateTime<Utc>,
    /// Derived from the service duration when omitted
    pub end: Option<DateTime<Utc>>,
    pub total_price: Decimal,
    #[serde(default)]
    pub mode: BookingMode,
    pub notes: Option<String>,
}

/// Direct status change request
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatus {
    pub status: BookingStatus,
    pub reason: Option<String>,
}

/// Limit/offset pagination, clamped to sane bounds
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl Page {
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Self {
        Self {
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
            offset: offset.unwrap_or(0).max(0),
        }
    }
}

#[derive(Clone)]
pub struct BookingService {
    ctx: Arc<EngineContext>,
}

impl BookingService {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self { ctx }
    }

    /// Create a booking for the acting client
    #[instrument(skip(self, request), fields(user_id = %actor.user_id, service_id = %request.service_id))]
    pub async fn create(&self, actor: Actor, request: CreateBooking) -> CoreResult<DbBooking> {
        actor.require(Role::Client)?;
        if let Some(end) = request.end {
            Interval::new(request.start, end)?;
        }

        let service = self
            .ctx
            .catalog
            .get_service(request.service_id)
            .await?
            .ok_or_else(|| CoreError::not_found("service", request.service_id))?;
        if !service.is_active {
            return Err(CoreError::validation("service is not available for booking"));
        }
        if request.provider_id.is_some_and(|p| p != service.provider_id) {
            return Err(CoreError::validation("service does not belong to this provider"));
        }

        let interval = Interval::resolve(request.start, request.end, service.duration_minutes)?;
        check_price_floor(
            request.total_price,
            service.price,
            service.pricing_type,
            self.ctx.config.booking.commission_rate,
        )?;
        let status = request.mode.initial_status();

        let mut tx = self.ctx.db.begin().await?;
        let client_id = self
            .ctx
            .resolver
            .resolve_raw_id(&mut *tx, Party::Client, actor.user_id)
            .await?;

        ProviderLock::acquire(&mut *tx, service.provider_id).await?;
        ConflictScheduler::ensure_available(&mut *tx, service.provider_id, &interval, None).await?;

        let booking = BookingRepo::insert(
            &mut *tx,
            &NewBooking {
                client_id,
                provider_id: service.provider_id,
                service_id: service.id,
                interval,
                status,
                mode: request.mode,
                total_price: request.total_price,
                notes: request.notes,
            },
        )
        .await?;

        let provider = self
            .ctx
            .resolver
            .resolve_user_id(&mut *tx, Party::Provider, booking.provider_id)
            .await?;
        let mut effects = SideEffects::default();
        let message = match request.mode {
            BookingMode::Instant => format!("New instant booking for {}", interval.start),
            BookingMode::Request => format!("New booking request for {}", interval.start),
        };
        effects.notify(provider, booking.id, NotificationKind::BookingRequest, message);
        effects.status_changed(booking.id, status, Some(actor.user_id));

        self.ctx.commit(tx, effects).await?;
        metrics::record_booking_created(request.mode.as_str());
        info!(booking_id = %booking.id, status = %status, "Booking created");
        Ok(booking)
    }

    /// Apply a direct status change
    pub async fn update_status(&self, actor: Actor, booking_id: Uuid, update: UpdateStatus) -> CoreResult<DbBooking> {
        let reason = update.reason.as_deref().map(str::trim).filter(|r| !r.is_empty());
        match update.status {
            BookingStatus::Accepted => self.accept(actor, booking_id).await,
            BookingStatus::Rejected => self.reject(actor, booking_id, reason).await,
            BookingStatus::Cancelled => self.cancel(actor, booking_id, reason).await,
            BookingStatus::Confirmed => self.reconfirm(actor, booking_id).await,
            BookingStatus::Completed => self.complete_unpaid(actor, booking_id).await,
            BookingStatus::Pending => Err(CoreError::validation("bookings cannot return to pending")),
            BookingStatus::AwaitingConfirmation => Err(CoreError::validation(
                "use the complete endpoint to submit completion evidence",
            )),
            BookingStatus::Disputed => Err(CoreError::validation(
                "disputes are raised by declining the completion",
            )),
        }
    }

    #[instrument(skip(self), fields(user_id = %actor.user_id))]
    pub async fn accept(&self, actor: Actor, booking_id: Uuid) -> CoreResult<DbBooking> {
        actor.require(Role::Provider)?;
        let mut tx = self.ctx.db.begin().await?;
        let booking = self.lock_for_schedule(&mut tx, booking_id).await?;
        let participants = self.ctx.resolver.participants(&mut *tx, &booking).await?;
        participants.require_provider(&actor)?;
        booking.status()?.transition_to(BookingStatus::Accepted)?;

        ConflictScheduler::ensure_available(
            &mut *tx,
            booking.provider_id,
            &booking.interval()?,
            Some(booking_id),
        )
        .await?;
        let booking = BookingRepo::set_status(&mut *tx, booking_id, BookingStatus::Accepted).await?;

        let mut effects = SideEffects::default();
        effects.notify(
            participants.client,
            booking_id,
            NotificationKind::BookingAccepted,
            "Your booking was accepted",
        );
        effects.status_changed(booking_id, BookingStatus::Accepted, Some(actor.user_id));
        self.ctx.commit(tx, effects).await?;
        info!(%booking_id, "Booking accepted");
        Ok(booking)
    }

    #[instrument(skip(self), fields(user_id = %actor.user_id))]
    pub async fn reject(&self, actor: Actor, booking_id: Uuid, reason: Option<&str>) -> CoreResult<DbBooking> {
        actor.require(Role::Provider)?;
        let mut tx = self.ctx.db.begin().await?;
        let booking = self.ctx.lock_booking(&mut tx, booking_id).await?;
        let participants = self.ctx.resolver.participants(&mut *tx, &booking).await?;
        participants.require_provider(&actor)?;
        booking.status()?.transition_to(BookingStatus::Rejected)?;

        let booking = BookingRepo::set_status(&mut *tx, booking_id, BookingStatus::Rejected).await?;

        let mut effects = SideEffects::default();
        let message = match reason {
            Some(reason) => format!("Your booking was declined: {}", reason),
            None => "Your booking was declined".to_string(),
        };
        effects.notify(participants.client, booking_id, NotificationKind::BookingRejected, message);
        effects.status_changed(booking_id, BookingStatus::Rejected, Some(actor.user_id));
        self.ctx.commit(tx, effects).await?;
        info!(%booking_id, "Booking rejected");
        Ok(booking)
    }

    /// Cancel by either participant. A captured payment is refunded out of
    /// escrow in the same transaction; an in-flight one is marked failed.
    #[instrument(skip(self), fields(user_id = %actor.user_id))]
    pub async fn cancel(&self, actor: Actor, booking_id: Uuid, reason: Option<&str>) -> CoreResult<DbBooking> {
        let mut tx = self.ctx.db.begin().await?;
        let booking = self.lock_for_schedule(&mut tx, booking_id).await?;
        let participants = self.ctx.resolver.participants(&mut *tx, &booking).await?;
        let party = participants
            .require_participant(&actor, false)?
            .ok_or_else(|| CoreError::forbidden("not a participant of this booking"))?;

        let status = booking.status()?;
        if !status.can_participant_cancel() {
            return Err(DomainError::InvalidTransition {
                from: status.to_string(),
                to: BookingStatus::Cancelled.to_string(),
            }
            .into());
        }

        let booking = BookingRepo::cancel(&mut *tx, booking_id, actor.user_id, reason).await?;

        if let Some(payment) = PaymentRepo::lock_by_booking(&mut *tx, booking_id).await? {
            let payment_status = payment.status()?;
            if payment_status.is_in_flight() {
                // A capture that still lands is refunded by the payment path
                PaymentRepo::set_status(
                    &mut *tx,
                    payment.id,
                    PaymentStatus::Failed,
                    Some("booking cancelled"),
                )
                .await?;
                BookingRepo::set_payment_status(&mut *tx, booking_id, PaymentStatus::Failed).await?;
                info!(%booking_id, payment_id = %payment.id, "In-flight payment closed on cancellation");
            } else if payment_status == PaymentStatus::Succeeded {
                let split = SettlementSplit::full_refund(payment.net_provider_amount);
                let settlement =
                    EscrowLedger::settle(&mut *tx, &payment, &split, Some(actor.user_id)).await?;
                PaymentRepo::record_refund(
                    &mut *tx,
                    payment.id,
                    settlement.refunded(),
                    PaymentStatus::Refunded,
                )
                .await?;
                BookingRepo::set_payment_status(&mut *tx, booking_id, PaymentStatus::Refunded).await?;
                info!(%booking_id, payment_id = %payment.id, refunded = %settlement.refunded(), "Escrow refunded on cancellation");
            }
        }

        let mut effects = SideEffects::default();
        let message = match reason {
            Some(reason) => format!("Booking cancelled: {}", reason),
            None => "Booking cancelled".to_string(),
        };
        effects.notify(
            participants.counterpart(party),
            booking_id,
            NotificationKind::BookingCancelled,
            message,
        );
        effects.status_changed(booking_id, BookingStatus::Cancelled, Some(actor.user_id));
        self.ctx.commit(tx, effects).await?;
        info!(%booking_id, "Booking cancelled");
        Ok(booking)
    }

    /// Provider reconfirms an accepted booking
    pub async fn reconfirm(&self, actor: Actor, booking_id: Uuid) -> CoreResult<DbBooking> {
        actor.require(Role::Provider)?;
        let mut tx = self.ctx.db.begin().await?;
        let booking = self.ctx.lock_booking(&mut tx, booking_id).await?;
        let participants = self.ctx.resolver.participants(&mut *tx, &booking).await?;
        participants.require_provider(&actor)?;
        booking.status()?.transition_to(BookingStatus::Confirmed)?;

        let booking = BookingRepo::set_status(&mut *tx, booking_id, BookingStatus::Confirmed).await?;
        let mut effects = SideEffects::default();
        effects.notify(
            participants.client,
            booking_id,
            NotificationKind::BookingAccepted,
            "Your booking was confirmed",
        );
        effects.status_changed(booking_id, BookingStatus::Confirmed, Some(actor.user_id));
        self.ctx.commit(tx, effects).await?;
        Ok(booking)
    }

    /// Legacy direct completion. Paid bookings must go through evidence and
    /// client confirmation so that escrow is released.
    pub async fn complete_unpaid(&self, actor: Actor, booking_id: Uuid) -> CoreResult<DbBooking> {
        actor.require(Role::Provider)?;
        let mut tx = self.ctx.db.begin().await?;
        let booking = self.ctx.lock_booking(&mut tx, booking_id).await?;
        let participants = self.ctx.resolver.participants(&mut *tx, &booking).await?;
        participants.require_provider(&actor)?;

        let status = booking.status()?;
        if !status.is_active() {
            return Err(DomainError::InvalidTransition {
                from: status.to_string(),
                to: BookingStatus::Completed.to_string(),
            }
            .into());
        }
        if let Some(payment) = PaymentRepo::lock_by_booking(&mut *tx, booking_id).await? {
            if payment.status()?.was_captured() {
                return Err(CoreError::conflict(
                    "paid bookings are completed with evidence and client confirmation",
                ));
            }
        }

        let booking = BookingRepo::set_status(&mut *tx, booking_id, BookingStatus::Completed).await?;
        let mut effects = SideEffects::default();
        effects.notify(
            participants.client,
            booking_id,
            NotificationKind::BookingCompleted,
            "Your booking was marked completed",
        );
        effects.status_changed(booking_id, BookingStatus::Completed, Some(actor.user_id));
        self.ctx.commit(tx, effects).await?;
        info!(%booking_id, "Booking completed without payment");
        Ok(booking)
    }

    /// Admin hard delete. Refused once money has been captured.
    #[instrument(skip(self), fields(user_id = %actor.user_id))]
    pub async fn delete(&self, actor: Actor, booking_id: Uuid) -> CoreResult<()> {
        actor.require(Role::Admin)?;
        let mut tx = self.ctx.db.begin().await?;
        self.ctx.lock_booking(&mut tx, booking_id).await?;

        if let Some(payment) = PaymentRepo::lock_by_booking(&mut *tx, booking_id).await? {
            if payment.status()?.was_captured() {
                return Err(CoreError::conflict(
                    "bookings with captured payments cannot be deleted",
                ));
            }
            PaymentRepo::delete_uncaptured(&mut *tx, payment.id).await?;
        }
        BookingRepo::delete(&mut *tx, booking_id).await?;

        tx.commit().await?;
        info!(%booking_id, "Booking deleted");
        Ok(())
    }

    /// Booking visible to its participants and admins
    pub async fn get(&self, actor: Actor, booking_id: Uuid) -> CoreResult<DbBooking> {
        let mut conn = self.ctx.db.pg.acquire().await?;
        let booking = BookingRepo::find_by_id(&mut conn, booking_id)
            .await?
            .ok_or_else(|| CoreError::not_found("booking", booking_id))?;
        self.ctx
            .resolver
            .participants(&mut conn, &booking)
            .await?
            .require_participant(&actor, true)?;
        Ok(booking)
    }

    /// The actor's bookings as client or provider
    pub async fn list_mine(
        &self,
        actor: Actor,
        status: Option<BookingStatus>,
        page: Page,
    ) -> CoreResult<Vec<DbBooking>> {
        let mut conn = self.ctx.db.pg.acquire().await?;
        let bookings = match actor.role {
            Role::Client => {
                let client_id = self
                    .ctx
                    .resolver
                    .resolve_raw_id(&mut conn, Party::Client, actor.user_id)
                    .await?;
                BookingRepo::list_by_client(&mut conn, client_id, status, page.limit, page.offset).await?
            }
            Role::Provider => {
                let provider_id = self
                    .ctx
                    .resolver
                    .resolve_raw_id(&mut conn, Party::Provider, actor.user_id)
                    .await?;
                BookingRepo::list_by_provider(&mut conn, provider_id, status, page.limit, page.offset)
                    .await?
            }
            Role::Admin => {
                return Err(CoreError::forbidden("admins list bookings by dispute status"));
            }
        };
        Ok(bookings)
    }

    pub async fn list_evidence(&self, actor: Actor, booking_id: Uuid) -> CoreResult<Vec<DbEvidence>> {
        self.get(actor, booking_id).await?;
        let mut conn = self.ctx.db.pg.acquire().await?;
        Ok(EvidenceRepo::list_by_booking(&mut conn, booking_id).await?)
    }

    /// Open disputes for the admin queue
    pub async fn list_disputed(&self, actor: Actor, page: Page) -> CoreResult<Vec<DbBooking>> {
        actor.require(Role::Admin)?;
        let mut conn = self.ctx.db.pg.acquire().await?;
        Ok(BookingRepo::list_disputed(&mut conn, page.limit, page.offset).await?)
    }

    /// Take the provider lock, then row-lock the booking
    async fn lock_for_schedule(&self, tx: &mut PgTx, booking_id: Uuid) -> CoreResult<DbBooking> {
        let provider_id = BookingRepo::find_by_id(&mut **tx, booking_id)
            .await?
            .ok_or_else(|| CoreError::not_found("booking", booking_id))?
            .provider_id;
        ProviderLock::acquire(&mut **tx, provider_id).await?;
        self.ctx.lock_booking(tx, booking_id).await
    }
}

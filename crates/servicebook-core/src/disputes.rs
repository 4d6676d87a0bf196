//! Dispute resolution
//!
//! Admin resolution splits the escrowed net amount between a client refund
//! and a provider release. Stale disputes resolve for the provider.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use servicebook_db::{
    BookingRepo, DbBooking, DbDisputeAudit, DisputeAuditRepo, NewDisputeAudit, PaymentRepo, PgTx,
};
use servicebook_types::{
    validate_refund_percentage, Actor, BookingStatus, DisputeFavor, Participants, PaymentStatus,
    Role, SettlementSplit,
};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::engine::EngineContext;
use crate::ledger::EscrowLedger;
use crate::notify::{NotificationKind, SideEffects};
use crate::{CoreError, CoreResult};

const AUTO_RESOLUTION: &str = "Automatically resolved in favor of the provider after the dispute timeout";

#[derive(Debug, Clone, Deserialize)]
pub struct ResolveDispute {
    pub resolution: String,
    pub favor: DisputeFavor,
    /// Defaults to 100 for the client and 0 for the provider
    pub refund_percentage: Option<Decimal>,
}

#[derive(Clone)]
pub struct DisputeEngine {
    ctx: Arc<EngineContext>,
}

impl DisputeEngine {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self { ctx }
    }

    /// Admin resolution of a disputed booking
    #[instrument(skip(self, request), fields(user_id = %actor.user_id, favor = request.favor.as_str()))]
    pub async fn resolve(&self, actor: Actor, booking_id: Uuid, request: ResolveDispute) -> CoreResult<DbBooking> {
        actor.require(Role::Admin)?;
        let resolution = request.resolution.trim();
        if resolution.is_empty() {
            return Err(CoreError::validation("resolution is required"));
        }
        let percentage = validate_refund_percentage(
            request
                .refund_percentage
                .unwrap_or_else(|| request.favor.default_refund_percentage()),
        )?;

        let mut tx = self.ctx.db.begin().await?;
        let booking = self.ctx.lock_booking(&mut tx, booking_id).await?;
        ensure_open(&booking)?;
        let participants = self.ctx.resolver.participants(&mut *tx, &booking).await?;

        let mut effects = SideEffects::default();
        let booking = self
            .settle(
                &mut tx,
                &booking,
                &participants,
                request.favor,
                percentage,
                resolution,
                Some(actor.user_id),
                &mut effects,
            )
            .await?;
        self.ctx.commit(tx, effects).await?;
        Ok(booking)
    }

    /// Resolve a stale dispute for the provider. Returns `false` when the
    /// booking no longer qualifies once locked.
    pub async fn auto_resolve(&self, booking_id: Uuid, now: DateTime<Utc>) -> CoreResult<bool> {
        let policy = self.ctx.config.booking.reconcile_policy();

        let mut tx = self.ctx.db.begin().await?;
        let booking = self.ctx.lock_booking(&mut tx, booking_id).await?;
        let still_due = booking.status()? == BookingStatus::Disputed
            && booking.dispute_resolved_at.is_none()
            && booking
                .dispute_raised_at
                .is_some_and(|raised| policy.dispute_expired(raised, now));
        if !still_due {
            debug!(%booking_id, "Dispute no longer due for auto-resolution");
            return Ok(false);
        }
        let participants = self.ctx.resolver.participants(&mut *tx, &booking).await?;

        let mut effects = SideEffects::default();
        self.settle(
            &mut tx,
            &booking,
            &participants,
            DisputeFavor::Provider,
            Decimal::ZERO,
            AUTO_RESOLUTION,
            None,
            &mut effects,
        )
        .await?;
        self.ctx.commit(tx, effects).await?;
        Ok(true)
    }

    pub async fn audit_log(&self, actor: Actor, booking_id: Uuid) -> CoreResult<Vec<DbDisputeAudit>> {
        actor.require(Role::Admin)?;
        let mut conn = self.ctx.db.pg.acquire().await?;
        Ok(DisputeAuditRepo::list_by_booking(&mut conn, booking_id).await?)
    }

    #[allow(clippy::too_many_arguments)]
    async fn settle(
        &self,
        tx: &mut PgTx,
        booking: &DbBooking,
        participants: &Participants,
        favor: DisputeFavor,
        percentage: Decimal,
        resolution: &str,
        resolved_by: Option<Uuid>,
        effects: &mut SideEffects,
    ) -> CoreResult<DbBooking> {
        let booking_id = booking.id;
        let final_status = booking.status()?.transition_to(favor.final_status())?;

        let mut refund_amount = Decimal::ZERO;
        let mut release_amount = Decimal::ZERO;
        let mut payment_id = None;

        if let Some(payment) = PaymentRepo::lock_by_booking(&mut **tx, booking_id).await? {
            if payment.status()? == PaymentStatus::Succeeded {
                let split = SettlementSplit::new(payment.net_provider_amount, percentage)?;
                let settlement = EscrowLedger::settle(&mut **tx, &payment, &split, resolved_by).await?;
                refund_amount = settlement.refunded();
                release_amount = settlement.released();
                if let Some(status) = split.payment_status() {
                    PaymentRepo::record_refund(&mut **tx, payment.id, refund_amount, status).await?;
                    BookingRepo::set_payment_status(&mut **tx, booking_id, status).await?;
                }
            }
            payment_id = Some(payment.id);
        }

        let updated =
            BookingRepo::resolve_dispute(&mut **tx, booking_id, final_status, resolution, resolved_by).await?;
        DisputeAuditRepo::insert(
            &mut **tx,
            &NewDisputeAudit {
                booking_id,
                payment_id,
                resolved_by,
                favor,
                refund_percentage: percentage,
                refund_amount,
                release_amount,
                resolution: resolution.to_string(),
                automatic: resolved_by.is_none(),
            },
        )
        .await?;

        let message = format!("Dispute resolved in favor of the {}: {}", favor.as_str(), resolution);
        for recipient in [participants.client, participants.provider] {
            effects.notify(recipient, booking_id, NotificationKind::DisputeResolved, message.clone());
        }
        effects.status_changed(booking_id, final_status, resolved_by);

        info!(
            %booking_id,
            favor = favor.as_str(),
            %percentage,
            refunded = %refund_amount,
            released = %release_amount,
            automatic = resolved_by.is_none(),
            "Dispute resolved"
        );
        Ok(updated)
    }
}

fn ensure_open(booking: &DbBooking) -> CoreResult<()> {
    if booking.dispute_resolved_at.is_some() {
        return Err(CoreError::conflict("dispute has already been resolved"));
    }
    if booking.status()? != BookingStatus::Disputed {
        return Err(CoreError::conflict(format!(
            "booking is {}, not disputed",
            booking.status
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn booking(status: BookingStatus, resolved: bool) -> DbBooking {
        let now = Utc::now();
        DbBooking {
            id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            provider_id: Uuid::new_v4(),
            service_id: Uuid::new_v4(),
            start_time: now,
            end_time: now + chrono::Duration::hours(1),
            status: status.as_str().to_string(),
            booking_mode: "request".into(),
            total_price: dec!(1000),
            notes: None,
            payment_status: None,
            accepted_at: None,
            rejected_at: None,
            cancelled_at: None,
            cancelled_by: None,
            cancellation_reason: None,
            completed_at: None,
            provider_completed_at: None,
            completion_notes: None,
            client_confirmed_at: None,
            confirmation_warning_sent_at: None,
            dispute_raised: true,
            dispute_reason: Some("item never arrived at venue".into()),
            dispute_raised_at: Some(now),
            dispute_resolution: None,
            dispute_resolved_by: None,
            dispute_resolved_at: resolved.then_some(now),
            original_start: None,
            original_end: None,
            reschedule_count: 0,
            reschedule_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_only_open_disputes_resolve() {
        assert!(ensure_open(&booking(BookingStatus::Disputed, false)).is_ok());

        let err = ensure_open(&booking(BookingStatus::Cancelled, true)).unwrap_err();
        assert!(err.to_string().contains("already been resolved"));

        let err = ensure_open(&booking(BookingStatus::AwaitingConfirmation, false)).unwrap_err();
        assert!(err.to_string().contains("not disputed"));
    }

    #[test]
    fn test_resolve_request_defaults() {
        let request: ResolveDispute = serde_json::from_value(serde_json::json!({
            "resolution": "Refund approved",
            "favor": "client"
        }))
        .unwrap();
        assert!(request.refund_percentage.is_none());
        assert_eq!(request.favor.default_refund_percentage(), dec!(100));
    }
}

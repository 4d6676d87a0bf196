use chrono::{DateTime, Utc};
use serde::Deserialize;
use servicebook_db::{BookingRepo, DbBooking};
use servicebook_types::{Actor, Interval};
use tracing::{info, instrument};
use uuid::Uuid;

use super::BookingService;
use crate::notify::{NotificationKind, SideEffects};
use crate::scheduler::ConflictScheduler;
use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Deserialize)]
pub struct RescheduleBooking {
    pub start: DateTime<Utc>,
    /// Keeps the current duration when omitted
    pub end: Option<DateTime<Utc>>,
    pub reason: Option<String>,
}

impl BookingService {
    /// Move a booking to a new interval
    #[instrument(skip(self, request), fields(user_id = %actor.user_id))]
    pub async fn reschedule(
        &self,
        actor: Actor,
        booking_id: Uuid,
        request: RescheduleBooking,
    ) -> CoreResult<DbBooking> {
        if let Some(end) = request.end {
            Interval::new(request.start, end)?;
        }

        let mut tx = self.ctx.db.begin().await?;
        let booking = self.lock_for_schedule(&mut tx, booking_id).await?;
        let participants = self.ctx.resolver.participants(&mut *tx, &booking).await?;
        let party = participants
            .require_participant(&actor, false)?
            .ok_or_else(|| CoreError::forbidden("not a participant of this booking"))?;

        let status = booking.status()?;
        if !status.can_reschedule() || booking.dispute_raised {
            return Err(CoreError::conflict(format!(
                "a {} booking cannot be rescheduled",
                status
            )));
        }
        let max = self.ctx.config.booking.max_reschedules;
        if booking.reschedule_count >= max {
            return Err(CoreError::conflict(format!(
                "booking was already rescheduled {} times",
                max
            )));
        }

        let current = booking.interval()?;
        let interval = match request.end {
            Some(end) => Interval::new(request.start, end)?,
            None => Interval::new(request.start, request.start + current.duration())?,
        };
        ConflictScheduler::ensure_available(&mut *tx, booking.provider_id, &interval, Some(booking_id))
            .await?;

        let reason = request.reason.as_deref().map(str::trim).filter(|r| !r.is_empty());
        let updated = BookingRepo::reschedule(&mut *tx, booking_id, &interval, reason).await?;

        let mut effects = SideEffects::default();
        let mut text = format!(
            "Booking rescheduled from {} - {} to {} - {}",
            current.start, current.end, interval.start, interval.end
        );
        if let Some(reason) = reason {
            text.push_str(&format!(" ({})", reason));
        }
        effects.system_message(booking_id, text.clone());
        effects.notify(
            participants.counterpart(party),
            booking_id,
            NotificationKind::BookingRescheduled,
            text,
        );
        effects.event(booking_id, status, Some(actor.user_id));
        self.ctx.commit(tx, effects).await?;
        info!(%booking_id, count = updated.reschedule_count, "Booking rescheduled");
        Ok(updated)
    }
}

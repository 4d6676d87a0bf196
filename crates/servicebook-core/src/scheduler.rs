//! Conflict scheduler
//!
//! Must run inside the transaction holding the provider's [`ProviderLock`]
//! so that the check and the write that follows it are atomic.
//!
//! [`ProviderLock`]: servicebook_db::ProviderLock

use servicebook_db::{AvailabilityRepo, BookingRepo};
use servicebook_types::Interval;
use sqlx::PgConnection;
use tracing::debug;
use uuid::Uuid;

use crate::{CoreError, CoreResult};

pub struct ConflictScheduler;

impl ConflictScheduler {
    /// Fail with a conflict when a touched date is blocked or the interval
    /// overlaps an existing booking
    pub async fn ensure_available(
        conn: &mut PgConnection,
        provider_id: Uuid,
        interval: &Interval,
        exclude: Option<Uuid>,
    ) -> CoreResult<()> {
        let (first, last) = interval.date_span();
        if let Some(block) = AvailabilityRepo::first_blocked(&mut *conn, provider_id, first, last).await? {
            debug!(%provider_id, date = %block.date, "Booking touches a blocked date");
            return Err(CoreError::conflict(format!(
                "provider is unavailable on {}",
                block.date
            )));
        }

        if let Some(existing) = BookingRepo::find_conflict(conn, provider_id, interval, exclude).await? {
            debug!(%provider_id, %existing, "Booking overlaps an existing booking");
            return Err(CoreError::conflict(
                "provider already has a booking in this time slot",
            ));
        }
        Ok(())
    }
}

//! Booking repository

use chrono::{DateTime, Utc};
use servicebook_types::{BookingStatus, Interval, PaymentStatus};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{DbBooking, DbResult, NewBooking};

pub struct BookingRepo;

impl BookingRepo {
    /// Insert a new booking
    pub async fn insert(conn: &mut PgConnection, new: &NewBooking) -> DbResult<DbBooking> {
        let booking = sqlx::query_as::<_, DbBooking>(
            r#"
            INSERT INTO bookings
                (client_id, provider_id, service_id, start_time, end_time, status, booking_mode,
                 total_price, notes, accepted_at)
            VALUES ($1, $2, $3, $4, $5, $6::text, $7, $8, $9,
                    CASE WHEN $6::text = 'accepted' THEN NOW() END)
            RETURNING *
            "#,
        )
        .bind(new.client_id)
        .bind(new.provider_id)
        .bind(new.service_id)
        .bind(new.interval.start)
        .bind(new.interval.end)
        .bind(new.status.as_str())
        .bind(new.mode.as_str())
        .bind(new.total_price)
        .bind(new.notes.as_deref())
        .fetch_one(conn)
        .await?;

        Ok(booking)
    }

    pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> DbResult<Option<DbBooking>> {
        let booking = sqlx::query_as::<_, DbBooking>("SELECT * FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(conn)
            .await?;
        Ok(booking)
    }

    /// Row-lock a booking for the rest of the transaction
    pub async fn lock_by_id(conn: &mut PgConnection, id: Uuid) -> DbResult<Option<DbBooking>> {
        let booking =
            sqlx::query_as::<_, DbBooking>("SELECT * FROM bookings WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(conn)
                .await?;
        Ok(booking)
    }

    /// First booking of the provider overlapping `[start, end)` that still
    /// holds its slot. `exclude` skips the booking being rescheduled.
    pub async fn find_conflict(
        conn: &mut PgConnection,
        provider_id: Uuid,
        interval: &Interval,
        exclude: Option<Uuid>,
    ) -> DbResult<Option<Uuid>> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM bookings
            WHERE provider_id = $1
              AND status NOT IN ('cancelled', 'rejected')
              AND start_time < $3
              AND end_time > $2
              AND ($4::uuid IS NULL OR id <> $4)
            ORDER BY start_time
            LIMIT 1
            "#,
        )
        .bind(provider_id)
        .bind(interval.start)
        .bind(interval.end)
        .bind(exclude)
        .fetch_optional(conn)
        .await?;
        Ok(id)
    }

    /// Move to `status`, stamping the matching lifecycle timestamp once
    pub async fn set_status(
        conn: &mut PgConnection,
        id: Uuid,
        status: BookingStatus,
    ) -> DbResult<DbBooking> {
        let booking = sqlx::query_as::<_, DbBooking>(
            r#"
            UPDATE bookings SET
                status = $2::text,
                accepted_at = CASE WHEN $2::text = 'accepted' THEN COALESCE(accepted_at, NOW()) ELSE accepted_at END,
                rejected_at = CASE WHEN $2::text = 'rejected' THEN COALESCE(rejected_at, NOW()) ELSE rejected_at END,
                cancelled_at = CASE WHEN $2::text = 'cancelled' THEN COALESCE(cancelled_at, NOW()) ELSE cancelled_at END,
                completed_at = CASE WHEN $2::text = 'completed' THEN COALESCE(completed_at, NOW()) ELSE completed_at END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .fetch_one(conn)
        .await?;
        Ok(booking)
    }

    /// Record who cancelled and why; `cancelled_at` is set once
    pub async fn cancel(
        conn: &mut PgConnection,
        id: Uuid,
        cancelled_by: Uuid,
        reason: Option<&str>,
    ) -> DbResult<DbBooking> {
        let booking = sqlx::query_as::<_, DbBooking>(
            r#"
            UPDATE bookings SET
                status = 'cancelled',
                cancelled_at = COALESCE(cancelled_at, NOW()),
                cancelled_by = COALESCE(cancelled_by, $2),
                cancellation_reason = COALESCE($3, cancellation_reason),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(cancelled_by)
        .bind(reason)
        .fetch_one(conn)
        .await?;
        Ok(booking)
    }

    /// Provider reports the work done
    pub async fn mark_provider_completed(
        conn: &mut PgConnection,
        id: Uuid,
        notes: Option<&str>,
    ) -> DbResult<DbBooking> {
        let booking = sqlx::query_as::<_, DbBooking>(
            r#"
            UPDATE bookings SET
                status = 'awaiting_confirmation',
                provider_completed_at = COALESCE(provider_completed_at, NOW()),
                completion_notes = $2,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(notes)
        .fetch_one(conn)
        .await?;
        Ok(booking)
    }

    /// Complete after confirmation. `client_confirmed` is false when the
    /// reconciler confirms on the client's behalf.
    pub async fn mark_completed(
        conn: &mut PgConnection,
        id: Uuid,
        client_confirmed: bool,
    ) -> DbResult<DbBooking> {
        let booking = sqlx::query_as::<_, DbBooking>(
            r#"
            UPDATE bookings SET
                status = 'completed',
                completed_at = COALESCE(completed_at, NOW()),
                client_confirmed_at = CASE WHEN $2 THEN COALESCE(client_confirmed_at, NOW())
                                           ELSE client_confirmed_at END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(client_confirmed)
        .fetch_one(conn)
        .await?;
        Ok(booking)
    }

    /// Client disputes the completion
    pub async fn raise_dispute(
        conn: &mut PgConnection,
        id: Uuid,
        reason: &str,
    ) -> DbResult<DbBooking> {
        let booking = sqlx::query_as::<_, DbBooking>(
            r#"
            UPDATE bookings SET
                status = 'disputed',
                dispute_raised = TRUE,
                dispute_reason = $2,
                dispute_raised_at = COALESCE(dispute_raised_at, NOW()),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(reason)
        .fetch_one(conn)
        .await?;
        Ok(booking)
    }

    /// Close a dispute with its final status. `resolved_by` is `None` for
    /// automatic resolution.
    pub async fn resolve_dispute(
        conn: &mut PgConnection,
        id: Uuid,
        status: BookingStatus,
        resolution: &str,
        resolved_by: Option<Uuid>,
    ) -> DbResult<DbBooking> {
        let booking = sqlx::query_as::<_, DbBooking>(
            r#"
            UPDATE bookings SET
                status = $2::text,
                dispute_resolution = $3,
                dispute_resolved_by = $4,
                dispute_resolved_at = COALESCE(dispute_resolved_at, NOW()),
                completed_at = CASE WHEN $2::text = 'completed' THEN COALESCE(completed_at, NOW()) ELSE completed_at END,
                cancelled_at = CASE WHEN $2::text = 'cancelled' THEN COALESCE(cancelled_at, NOW()) ELSE cancelled_at END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(resolution)
        .bind(resolved_by)
        .fetch_one(conn)
        .await?;
        Ok(booking)
    }

    /// Move to a new interval. The original interval is kept from the first
    /// reschedule only.
    pub async fn reschedule(
        conn: &mut PgConnection,
        id: Uuid,
        interval: &Interval,
        reason: Option<&str>,
    ) -> DbResult<DbBooking> {
        let booking = sqlx::query_as::<_, DbBooking>(
            r#"
            UPDATE bookings SET
                original_start = COALESCE(original_start, start_time),
                original_end = COALESCE(original_end, end_time),
                start_time = $2,
                end_time = $3,
                reschedule_count = reschedule_count + 1,
                reschedule_reason = $4,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(interval.start)
        .bind(interval.end)
        .bind(reason)
        .fetch_one(conn)
        .await?;
        Ok(booking)
    }

    /// Mirror the payment status onto the booking
    pub async fn set_payment_status(
        conn: &mut PgConnection,
        id: Uuid,
        status: PaymentStatus,
    ) -> DbResult<()> {
        sqlx::query("UPDATE bookings SET payment_status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(conn)
            .await?;
        Ok(())
    }

    pub async fn mark_warning_sent(conn: &mut PgConnection, id: Uuid) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE bookings
            SET confirmation_warning_sent_at = COALESCE(confirmation_warning_sent_at, NOW()),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Hard delete. Evidence rows cascade.
    pub async fn delete(conn: &mut PgConnection, id: Uuid) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM bookings WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Listings
    // =========================================================================

    pub async fn list_by_client(
        conn: &mut PgConnection,
        client_id: Uuid,
        status: Option<BookingStatus>,
        limit: i64,
        offset: i64,
    ) -> DbResult<Vec<DbBooking>> {
        let bookings = sqlx::query_as::<_, DbBooking>(
            r#"
            SELECT * FROM bookings
            WHERE client_id = $1 AND ($2::text IS NULL OR status = $2)
            ORDER BY start_time DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(client_id)
        .bind(status.map(|s| s.as_str()))
        .bind(limit)
        .bind(offset)
        .fetch_all(conn)
        .await?;
        Ok(bookings)
    }

    pub async fn list_by_provider(
        conn: &mut PgConnection,
        provider_id: Uuid,
        status: Option<BookingStatus>,
        limit: i64,
        offset: i64,
    ) -> DbResult<Vec<DbBooking>> {
        let bookings = sqlx::query_as::<_, DbBooking>(
            r#"
            SELECT * FROM bookings
            WHERE provider_id = $1 AND ($2::text IS NULL OR status = $2)
            ORDER BY start_time DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(provider_id)
        .bind(status.map(|s| s.as_str()))
        .bind(limit)
        .bind(offset)
        .fetch_all(conn)
        .await?;
        Ok(bookings)
    }

    /// Open disputes, oldest first
    pub async fn list_disputed(
        conn: &mut PgConnection,
        limit: i64,
        offset: i64,
    ) -> DbResult<Vec<DbBooking>> {
        let bookings = sqlx::query_as::<_, DbBooking>(
            r#"
            SELECT * FROM bookings
            WHERE status = 'disputed'
            ORDER BY dispute_raised_at ASC NULLS LAST
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(conn)
        .await?;
        Ok(bookings)
    }

    // =========================================================================
    // Reconciler candidates (ids only; each is re-read under lock)
    // =========================================================================

    /// Awaiting confirmation, completed at or before `completed_before`,
    /// not before `not_before` and not yet warned
    pub async fn due_for_warning(
        conn: &mut PgConnection,
        completed_before: DateTime<Utc>,
        not_before: DateTime<Utc>,
        limit: i64,
    ) -> DbResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM bookings
            WHERE status = 'awaiting_confirmation'
              AND confirmation_warning_sent_at IS NULL
              AND provider_completed_at <= $1
              AND provider_completed_at >= $2
            ORDER BY provider_completed_at
            LIMIT $3
            "#,
        )
        .bind(completed_before)
        .bind(not_before)
        .bind(limit)
        .fetch_all(conn)
        .await?;
        Ok(ids)
    }

    /// Awaiting confirmation and completed strictly before `completed_before`
    pub async fn due_for_auto_confirm(
        conn: &mut PgConnection,
        completed_before: DateTime<Utc>,
        limit: i64,
    ) -> DbResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM bookings
            WHERE status = 'awaiting_confirmation'
              AND client_confirmed_at IS NULL
              AND provider_completed_at < $1
            ORDER BY provider_completed_at
            LIMIT $2
            "#,
        )
        .bind(completed_before)
        .bind(limit)
        .fetch_all(conn)
        .await?;
        Ok(ids)
    }

    pub async fn stale_disputes(
        conn: &mut PgConnection,
        raised_before: DateTime<Utc>,
        limit: i64,
    ) -> DbResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM bookings
            WHERE status = 'disputed'
              AND dispute_resolved_at IS NULL
              AND dispute_raised_at <= $1
            ORDER BY dispute_raised_at
            LIMIT $2
            "#,
        )
        .bind(raised_before)
        .bind(limit)
        .fetch_all(conn)
        .await?;
        Ok(ids)
    }
}

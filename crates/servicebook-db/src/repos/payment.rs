//! Payment repository

use rust_decimal::Decimal;
use servicebook_types::{CommissionSplit, PaymentStatus};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{DbPayment, DbResult, NewPayment};

pub struct PaymentRepo;

impl PaymentRepo {
    /// Insert a pending payment
    pub async fn insert(conn: &mut PgConnection, new: &NewPayment) -> DbResult<DbPayment> {
        let payment = sqlx::query_as::<_, DbPayment>(
            r#"
            INSERT INTO payments
                (booking_id, client_id, provider_id, gross_amount, commission_rate,
                 commission_amount, net_provider_amount, status, idempotency_key,
                 gateway_intent_id, client_secret)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(new.booking_id)
        .bind(new.client_id)
        .bind(new.provider_id)
        .bind(new.split.gross)
        .bind(new.split.rate)
        .bind(new.split.commission)
        .bind(new.split.net)
        .bind(&new.idempotency_key)
        .bind(&new.gateway_intent_id)
        .bind(new.client_secret.as_deref())
        .fetch_one(conn)
        .await?;
        Ok(payment)
    }

    /// Point a failed payment at a fresh intent and put it back to pending
    pub async fn rearm(
        conn: &mut PgConnection,
        id: Uuid,
        split: &CommissionSplit,
        gateway_intent_id: &str,
        client_secret: Option<&str>,
    ) -> DbResult<DbPayment> {
        let payment = sqlx::query_as::<_, DbPayment>(
            r#"
            UPDATE payments SET
                status = 'pending',
                gross_amount = $2,
                commission_rate = $3,
                commission_amount = $4,
                net_provider_amount = $5,
                gateway_intent_id = $6,
                client_secret = $7,
                payment_method_id = NULL,
                failure_reason = NULL,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(split.gross)
        .bind(split.rate)
        .bind(split.commission)
        .bind(split.net)
        .bind(gateway_intent_id)
        .bind(client_secret)
        .fetch_one(conn)
        .await?;
        Ok(payment)
    }

    pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> DbResult<Option<DbPayment>> {
        let payment = sqlx::query_as::<_, DbPayment>("SELECT * FROM payments WHERE id = $1")
            .bind(id)
            .fetch_optional(conn)
            .await?;
        Ok(payment)
    }

    pub async fn find_by_booking(
        conn: &mut PgConnection,
        booking_id: Uuid,
    ) -> DbResult<Option<DbPayment>> {
        let payment =
            sqlx::query_as::<_, DbPayment>("SELECT * FROM payments WHERE booking_id = $1")
                .bind(booking_id)
                .fetch_optional(conn)
                .await?;
        Ok(payment)
    }

    pub async fn lock_by_booking(
        conn: &mut PgConnection,
        booking_id: Uuid,
    ) -> DbResult<Option<DbPayment>> {
        let payment = sqlx::query_as::<_, DbPayment>(
            "SELECT * FROM payments WHERE booking_id = $1 FOR UPDATE",
        )
        .bind(booking_id)
        .fetch_optional(conn)
        .await?;
        Ok(payment)
    }

    /// Unlocked lookup; lock the booking and then the payment before writing
    pub async fn find_by_intent(
        conn: &mut PgConnection,
        gateway_intent_id: &str,
    ) -> DbResult<Option<DbPayment>> {
        let payment = sqlx::query_as::<_, DbPayment>(
            "SELECT * FROM payments WHERE gateway_intent_id = $1",
        )
        .bind(gateway_intent_id)
        .fetch_optional(conn)
        .await?;
        Ok(payment)
    }

    pub async fn set_method(
        conn: &mut PgConnection,
        id: Uuid,
        payment_method_id: &str,
    ) -> DbResult<DbPayment> {
        let payment = sqlx::query_as::<_, DbPayment>(
            r#"
            UPDATE payments SET payment_method_id = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(payment_method_id)
        .fetch_one(conn)
        .await?;
        Ok(payment)
    }

    /// Set status. `paid_at` is stamped once on success and `failure_reason`
    /// is only written for failures.
    pub async fn set_status(
        conn: &mut PgConnection,
        id: Uuid,
        status: PaymentStatus,
        failure_reason: Option<&str>,
    ) -> DbResult<DbPayment> {
        let payment = sqlx::query_as::<_, DbPayment>(
            r#"
            UPDATE payments SET
                status = $2::text,
                paid_at = CASE WHEN $2::text = 'succeeded' THEN COALESCE(paid_at, NOW()) ELSE paid_at END,
                failure_reason = CASE WHEN $2::text = 'failed' THEN $3 ELSE failure_reason END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(failure_reason)
        .fetch_one(conn)
        .await?;
        Ok(payment)
    }

    /// Record a refund against the payment
    pub async fn record_refund(
        conn: &mut PgConnection,
        id: Uuid,
        amount: Decimal,
        status: PaymentStatus,
    ) -> DbResult<DbPayment> {
        let payment = sqlx::query_as::<_, DbPayment>(
            r#"
            UPDATE payments SET
                status = $3,
                refunded_amount = refunded_amount + $2,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(amount)
        .bind(status.as_str())
        .fetch_one(conn)
        .await?;
        Ok(payment)
    }

    /// Remove a payment that never captured money
    pub async fn delete_uncaptured(conn: &mut PgConnection, id: Uuid) -> DbResult<bool> {
        let result = sqlx::query(
            "DELETE FROM payments WHERE id = $1 AND status IN ('pending', 'processing', 'failed')",
        )
        .bind(id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

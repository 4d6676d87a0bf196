//! Dispute audit repository. Rows are insert-only.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::{DbDisputeAudit, DbResult, NewDisputeAudit};

pub struct DisputeAuditRepo;

impl DisputeAuditRepo {
    pub async fn insert(conn: &mut PgConnection, new: &NewDisputeAudit) -> DbResult<DbDisputeAudit> {
        let row = sqlx::query_as::<_, DbDisputeAudit>(
            r#"
            INSERT INTO dispute_audit_log
                (booking_id, payment_id, resolved_by, favor, refund_percentage,
                 refund_amount, release_amount, resolution, automatic)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(new.booking_id)
        .bind(new.payment_id)
        .bind(new.resolved_by)
        .bind(new.favor.as_str())
        .bind(new.refund_percentage)
        .bind(new.refund_amount)
        .bind(new.release_amount)
        .bind(&new.resolution)
        .bind(new.automatic)
        .fetch_one(conn)
        .await?;
        Ok(row)
    }

    pub async fn list_by_booking(
        conn: &mut PgConnection,
        booking_id: Uuid,
    ) -> DbResult<Vec<DbDisputeAudit>> {
        let rows = sqlx::query_as::<_, DbDisputeAudit>(
            "SELECT * FROM dispute_audit_log WHERE booking_id = $1 ORDER BY created_at",
        )
        .bind(booking_id)
        .fetch_all(conn)
        .await?;
        Ok(rows)
    }
}

//! Completion evidence repository

use sqlx::PgConnection;
use uuid::Uuid;

use crate::{DbEvidence, DbResult, NewEvidence};

pub struct EvidenceRepo;

impl EvidenceRepo {
    pub async fn insert(
        conn: &mut PgConnection,
        booking_id: Uuid,
        uploaded_by: Uuid,
        evidence: &NewEvidence,
    ) -> DbResult<DbEvidence> {
        let row = sqlx::query_as::<_, DbEvidence>(
            r#"
            INSERT INTO booking_evidence (booking_id, evidence_type, file_url, description, uploaded_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(booking_id)
        .bind(evidence.evidence_type.as_str())
        .bind(&evidence.file_url)
        .bind(evidence.description.as_deref())
        .bind(uploaded_by)
        .fetch_one(conn)
        .await?;
        Ok(row)
    }

    pub async fn list_by_booking(
        conn: &mut PgConnection,
        booking_id: Uuid,
    ) -> DbResult<Vec<DbEvidence>> {
        let rows = sqlx::query_as::<_, DbEvidence>(
            "SELECT * FROM booking_evidence WHERE booking_id = $1 ORDER BY uploaded_at, id",
        )
        .bind(booking_id)
        .fetch_all(conn)
        .await?;
        Ok(rows)
    }
}

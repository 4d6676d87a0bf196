//! Read-only catalog queries: services and provider day blocks

use chrono::NaiveDate;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{DbAvailabilityOverride, DbResult, DbService};

pub struct ServiceRepo;

impl ServiceRepo {
    pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> DbResult<Option<DbService>> {
        let service = sqlx::query_as::<_, DbService>("SELECT * FROM services WHERE id = $1")
            .bind(id)
            .fetch_optional(conn)
            .await?;
        Ok(service)
    }
}

pub struct AvailabilityRepo;

impl AvailabilityRepo {
    /// Earliest blocked override of the provider between `first` and `last`, inclusive
    pub async fn first_blocked(
        conn: &mut PgConnection,
        provider_id: Uuid,
        first: NaiveDate,
        last: NaiveDate,
    ) -> DbResult<Option<DbAvailabilityOverride>> {
        let row = sqlx::query_as::<_, DbAvailabilityOverride>(
            r#"
            SELECT * FROM provider_availability_overrides
            WHERE provider_id = $1 AND is_blocked AND date BETWEEN $2 AND $3
            ORDER BY date
            LIMIT 1
            "#,
        )
        .bind(provider_id)
        .bind(first)
        .bind(last)
        .fetch_optional(conn)
        .await?;
        Ok(row)
    }
}

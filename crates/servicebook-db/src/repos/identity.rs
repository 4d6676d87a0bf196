//! Identity lookups: admins and the client/provider indirection tables

use sqlx::PgConnection;
use uuid::Uuid;

use crate::DbResult;

pub struct IdentityRepo;

impl IdentityRepo {
    /// All admin user ids
    pub async fn admin_ids(conn: &mut PgConnection) -> DbResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>("SELECT id FROM users WHERE role = 'admin' ORDER BY created_at")
            .fetch_all(conn)
            .await?;
        Ok(ids)
    }

    pub async fn client_user_id(conn: &mut PgConnection, client_id: Uuid) -> DbResult<Option<Uuid>> {
        let id = sqlx::query_scalar::<_, Uuid>("SELECT user_id FROM clients WHERE id = $1")
            .bind(client_id)
            .fetch_optional(conn)
            .await?;
        Ok(id)
    }

    pub async fn provider_user_id(conn: &mut PgConnection, provider_id: Uuid) -> DbResult<Option<Uuid>> {
        let id = sqlx::query_scalar::<_, Uuid>("SELECT user_id FROM providers WHERE id = $1")
            .bind(provider_id)
            .fetch_optional(conn)
            .await?;
        Ok(id)
    }

    pub async fn client_id_for_user(conn: &mut PgConnection, user_id: Uuid) -> DbResult<Option<Uuid>> {
        let id = sqlx::query_scalar::<_, Uuid>("SELECT id FROM clients WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(conn)
            .await?;
        Ok(id)
    }

    pub async fn provider_id_for_user(conn: &mut PgConnection, user_id: Uuid) -> DbResult<Option<Uuid>> {
        let id = sqlx::query_scalar::<_, Uuid>("SELECT id FROM providers WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(conn)
            .await?;
        Ok(id)
    }
}

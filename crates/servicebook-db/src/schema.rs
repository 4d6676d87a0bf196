//! Schema metadata written by migrations

use sqlx::PgConnection;

use crate::DbResult;

/// Key under which the identity mode is recorded
pub const IDENTITY_MODE_KEY: &str = "identity_mode";

pub struct SchemaMetaRepo;

impl SchemaMetaRepo {
    /// Read a metadata value
    pub async fn get(conn: &mut PgConnection, key: &str) -> DbResult<Option<String>> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM schema_meta WHERE key = $1")
            .bind(key)
            .fetch_optional(conn)
            .await?;
        Ok(value)
    }

    /// Identity mode recorded for this database, if any
    pub async fn identity_mode(conn: &mut PgConnection) -> DbResult<Option<String>> {
        Self::get(conn, IDENTITY_MODE_KEY).await
    }
}

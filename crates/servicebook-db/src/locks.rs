//! Transaction-scoped advisory locks

use sqlx::PgConnection;
use uuid::Uuid;

use crate::DbResult;

/// Serializes schedule-dependent mutations for one provider.
///
/// Held until the surrounding transaction commits or rolls back. Acquiring it
/// outside a transaction releases it immediately and protects nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderLock {
    key: i64,
}

impl ProviderLock {
    pub fn for_provider(provider_id: Uuid) -> Self {
        Self {
            key: advisory_key(provider_id),
        }
    }

    pub fn key(&self) -> i64 {
        self.key
    }

    /// Block until the lock is held by this transaction
    pub async fn acquire(conn: &mut PgConnection, provider_id: Uuid) -> DbResult<Self> {
        let lock = Self::for_provider(provider_id);
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(lock.key)
            .execute(conn)
            .await?;
        Ok(lock)
    }
}

/// Fold a UUID into the 64-bit advisory key space
fn advisory_key(id: Uuid) -> i64 {
    let bytes = id.as_bytes();
    let mut hi = [0u8; 8];
    let mut lo = [0u8; 8];
    hi.copy_from_slice(&bytes[..8]);
    lo.copy_from_slice(&bytes[8..]);
    i64::from_be_bytes(hi) ^ i64::from_be_bytes(lo)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_stable_per_provider() {
        let provider = Uuid::new_v4();
        assert_eq!(
            ProviderLock::for_provider(provider),
            ProviderLock::for_provider(provider)
        );
    }

    #[test]
    fn test_key_uses_whole_uuid() {
        let a = Uuid::from_u128(0x0000_0000_0000_0001_0000_0000_0000_0000);
        let b = Uuid::from_u128(0x0000_0000_0000_0000_0000_0000_0000_0001);
        assert_ne!(advisory_key(a), 0);
        assert_ne!(advisory_key(b), 0);
        assert_ne!(advisory_key(Uuid::new_v4()), advisory_key(Uuid::new_v4()));
    }
}

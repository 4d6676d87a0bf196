//! Escrow wallet repository
//!
//! Balance updates assume the wallet row is already locked by
//! [`WalletRepo::lock_or_create`] in the same transaction.

use rust_decimal::Decimal;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{DbResult, DbWallet, DbWalletTransaction, NewWalletTransaction};

pub struct WalletRepo;

impl WalletRepo {
    pub async fn find_by_provider(
        conn: &mut PgConnection,
        provider_id: Uuid,
    ) -> DbResult<Option<DbWallet>> {
        let wallet =
            sqlx::query_as::<_, DbWallet>("SELECT * FROM wallets WHERE provider_id = $1")
                .bind(provider_id)
                .fetch_optional(conn)
                .await?;
        Ok(wallet)
    }

    /// Lock the provider's wallet, creating it with zero balances first if
    /// it does not exist
    pub async fn lock_or_create(conn: &mut PgConnection, provider_id: Uuid) -> DbResult<DbWallet> {
        sqlx::query("INSERT INTO wallets (provider_id) VALUES ($1) ON CONFLICT (provider_id) DO NOTHING")
            .bind(provider_id)
            .execute(&mut *conn)
            .await?;

        let wallet = sqlx::query_as::<_, DbWallet>(
            "SELECT * FROM wallets WHERE provider_id = $1 FOR UPDATE",
        )
        .bind(provider_id)
        .fetch_one(conn)
        .await?;
        Ok(wallet)
    }

    /// Apply deltas and return the row as stored after the update
    pub async fn apply_deltas(
        conn: &mut PgConnection,
        wallet_id: Uuid,
        pending_delta: Decimal,
        available_delta: Decimal,
    ) -> DbResult<DbWallet> {
        let wallet = sqlx::query_as::<_, DbWallet>(
            r#"
            UPDATE wallets SET
                pending_balance = pending_balance + $2,
                available_balance = available_balance + $3,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(wallet_id)
        .bind(pending_delta)
        .bind(available_delta)
        .fetch_one(conn)
        .await?;
        Ok(wallet)
    }

    // =========================================================================
    // Transaction log
    // =========================================================================

    pub async fn reference_exists(conn: &mut PgConnection, reference_id: &str) -> DbResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM wallet_transactions WHERE reference_id = $1)",
        )
        .bind(reference_id)
        .fetch_one(conn)
        .await?;
        Ok(exists)
    }

    /// Append a ledger row
    pub async fn insert_transaction(
        conn: &mut PgConnection,
        new: &NewWalletTransaction,
    ) -> DbResult<DbWalletTransaction> {
        let tx = sqlx::query_as::<_, DbWalletTransaction>(
            r#"
            INSERT INTO wallet_transactions
                (wallet_id, payment_id, type, balance_kind, amount, balance_after,
                 reference_id, description, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(new.wallet_id)
        .bind(new.payment_id)
        .bind(new.tx_type.as_str())
        .bind(new.balance_kind.as_str())
        .bind(new.amount)
        .bind(new.balance_after)
        .bind(new.reference_id.as_deref())
        .bind(new.description.as_deref())
        .bind(new.created_by)
        .fetch_one(conn)
        .await?;
        Ok(tx)
    }

    pub async fn list_transactions(
        conn: &mut PgConnection,
        wallet_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> DbResult<Vec<DbWalletTransaction>> {
        let txs = sqlx::query_as::<_, DbWalletTransaction>(
            r#"
            SELECT * FROM wallet_transactions
            WHERE wallet_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(wallet_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(conn)
        .await?;
        Ok(txs)
    }

    pub async fn list_by_payment(
        conn: &mut PgConnection,
        payment_id: Uuid,
    ) -> DbResult<Vec<DbWalletTransaction>> {
        let txs = sqlx::query_as::<_, DbWalletTransaction>(
            "SELECT * FROM wallet_transactions WHERE payment_id = $1 ORDER BY created_at, id",
        )
        .bind(payment_id)
        .fetch_all(conn)
        .await?;
        Ok(txs)
    }
}

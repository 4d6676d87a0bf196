//! Escrow wallet ledger
//!
//! The only code that changes wallet balances. Every mutation locks the
//! provider's wallet row first and appends to the transaction log in the
//! caller's database transaction.
//!
//! # Money flow
//!
//! ```text
//! payment succeeded ──credit──▶ pending ──release──▶ available
//!                                  │
//!                                  └──refund──▶ (back to client)
//! ```

use rust_decimal::Decimal;
use serde::Serialize;
use servicebook_db::{
    DbPayment, DbWallet, DbWalletTransaction, NewWalletTransaction, PaymentRepo, WalletRepo,
};
use servicebook_types::{
    plan_movement, reference, BalanceKind, Balances, EscrowMovement, PaymentStatus,
    SettlementSplit, TransactionType,
};
use sqlx::PgConnection;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{metrics, CoreResult};

/// Result of moving a payment's escrow out of pending
#[derive(Debug, Clone)]
pub enum Settlement {
    /// Funds moved; `movement` holds the amounts actually applied
    Applied {
        movement: EscrowMovement,
        wallet: DbWallet,
    },
    /// A release or refund for this payment was already recorded
    AlreadySettled,
}

impl Settlement {
    pub fn movement(&self) -> Option<&EscrowMovement> {
        match self {
            Settlement::Applied { movement, .. } => Some(movement),
            Settlement::AlreadySettled => None,
        }
    }

    pub fn refunded(&self) -> Decimal {
        self.movement().map(|m| m.refund).unwrap_or_default()
    }

    pub fn released(&self) -> Decimal {
        self.movement().map(|m| m.release).unwrap_or_default()
    }
}

/// Provider-facing wallet view
#[derive(Debug, Clone, Serialize)]
pub struct WalletSummary {
    pub wallet_id: Option<Uuid>,
    pub provider_id: Uuid,
    pub balances: Balances,
}

pub struct EscrowLedger;

impl EscrowLedger {
    /// Escrow a succeeded payment's net amount in the provider's pending
    /// balance. Returns `None` when the credit was already recorded.
    pub async fn credit_payment(
        conn: &mut PgConnection,
        payment: &DbPayment,
    ) -> CoreResult<Option<DbWalletTransaction>> {
        let wallet = WalletRepo::lock_or_create(&mut *conn, payment.provider_id).await?;
        let reference_id = reference::credit(payment.id);
        if WalletRepo::reference_exists(&mut *conn, &reference_id).await? {
            debug!(payment_id = %payment.id, "Credit already recorded");
            return Ok(None);
        }

        wallet.balances().credit_pending(payment.net_provider_amount)?;
        let wallet =
            WalletRepo::apply_deltas(&mut *conn, wallet.id, payment.net_provider_amount, Decimal::ZERO)
                .await?;

        let row = WalletRepo::insert_transaction(
            conn,
            &NewWalletTransaction {
                wallet_id: wallet.id,
                payment_id: Some(payment.id),
                tx_type: TransactionType::PaymentReceived,
                balance_kind: BalanceKind::Pending,
                amount: payment.net_provider_amount,
                balance_after: wallet.pending_balance,
                reference_id: Some(reference_id),
                description: Some(format!("Escrow for booking {}", payment.booking_id)),
                created_by: None,
            },
        )
        .await?;

        info!(
            payment_id = %payment.id,
            provider_id = %payment.provider_id,
            amount = %payment.net_provider_amount,
            "Escrow credited"
        );
        Ok(Some(row))
    }

    /// Move the whole net amount from pending to available
    pub async fn release_payment(conn: &mut PgConnection, payment: &DbPayment) -> CoreResult<Settlement> {
        Self::settle(
            conn,
            payment,
            &SettlementSplit::full_release(payment.net_provider_amount),
            None,
        )
        .await
    }

    /// Release the escrow of a booking's payment if it has succeeded.
    /// Bookings without a captured payment have nothing to release.
    pub async fn release_for_booking(
        conn: &mut PgConnection,
        booking_id: Uuid,
    ) -> CoreResult<Option<Settlement>> {
        let Some(payment) = PaymentRepo::lock_by_booking(&mut *conn, booking_id).await? else {
            return Ok(None);
        };
        if payment.status()? != PaymentStatus::Succeeded {
            debug!(%booking_id, status = %payment.status, "No escrow to release");
            return Ok(None);
        }
        Ok(Some(Self::release_payment(conn, &payment).await?))
    }

    /// Take `split.net` out of pending, crediting `split.release` to
    /// available and returning `split.refund` to the client. A short pending
    /// balance clamps the movement instead of failing.
    pub async fn settle(
        conn: &mut PgConnection,
        payment: &DbPayment,
        split: &SettlementSplit,
        actor: Option<Uuid>,
    ) -> CoreResult<Settlement> {
        let wallet = WalletRepo::lock_or_create(&mut *conn, payment.provider_id).await?;

        let release_ref = reference::release(payment.id);
        let refund_ref = reference::refund(payment.id);
        if WalletRepo::reference_exists(&mut *conn, &release_ref).await?
            || WalletRepo::reference_exists(&mut *conn, &refund_ref).await?
        {
            debug!(payment_id = %payment.id, "Escrow already settled");
            return Ok(Settlement::AlreadySettled);
        }

        let movement = plan_movement(wallet.pending_balance, split.release, split.refund);
        if movement.clamped {
            warn!(
                payment_id = %payment.id,
                provider_id = %payment.provider_id,
                pending = %wallet.pending_balance,
                requested = %split.net,
                "Pending balance short of escrow amount, clamping settlement"
            );
        }

        let wallet = WalletRepo::apply_deltas(
            &mut *conn,
            wallet.id,
            -movement.pending_debit,
            movement.release,
        )
        .await?;

        if movement.release > Decimal::ZERO {
            WalletRepo::insert_transaction(
                &mut *conn,
                &NewWalletTransaction {
                    wallet_id: wallet.id,
                    payment_id: Some(payment.id),
                    tx_type: TransactionType::PaymentReceived,
                    balance_kind: BalanceKind::Available,
                    amount: movement.release,
                    balance_after: wallet.available_balance,
                    reference_id: Some(release_ref),
                    description: Some(format!("Escrow released for booking {}", payment.booking_id)),
                    created_by: actor,
                },
            )
            .await?;
            metrics::record_escrow_released();
        }

        if movement.refund > Decimal::ZERO {
            WalletRepo::insert_transaction(
                &mut *conn,
                &NewWalletTransaction {
                    wallet_id: wallet.id,
                    payment_id: Some(payment.id),
                    tx_type: TransactionType::Refund,
                    balance_kind: BalanceKind::Pending,
                    amount: -movement.refund,
                    balance_after: wallet.pending_balance,
                    reference_id: Some(refund_ref),
                    description: Some(format!("Refund for booking {}", payment.booking_id)),
                    created_by: actor,
                },
            )
            .await?;
        }

        info!(
            payment_id = %payment.id,
            provider_id = %payment.provider_id,
            released = %movement.release,
            refunded = %movement.refund,
            "Escrow settled"
        );
        Ok(Settlement::Applied { movement, wallet })
    }

    /// Admin correction of one balance by a signed delta
    pub async fn adjust(
        conn: &mut PgConnection,
        provider_id: Uuid,
        kind: BalanceKind,
        delta: Decimal,
        reason: &str,
        admin_id: Uuid,
    ) -> CoreResult<DbWalletTransaction> {
        let wallet = WalletRepo::lock_or_create(&mut *conn, provider_id).await?;
        wallet.balances().apply_adjustment(kind, delta)?;

        let (pending_delta, available_delta) = match kind {
            BalanceKind::Pending => (delta, Decimal::ZERO),
            BalanceKind::Available => (Decimal::ZERO, delta),
        };
        let wallet = WalletRepo::apply_deltas(&mut *conn, wallet.id, pending_delta, available_delta).await?;

        let row = WalletRepo::insert_transaction(
            conn,
            &NewWalletTransaction {
                wallet_id: wallet.id,
                payment_id: None,
                tx_type: TransactionType::Adjustment,
                balance_kind: kind,
                amount: delta,
                balance_after: wallet.balances().get(kind),
                reference_id: Some(reference::adjustment(Uuid::new_v4())),
                description: Some(reason.to_string()),
                created_by: Some(admin_id),
            },
        )
        .await?;

        info!(%provider_id, %admin_id, kind = kind.as_str(), %delta, "Wallet adjusted");
        Ok(row)
    }

    pub async fn summary(conn: &mut PgConnection, provider_id: Uuid) -> CoreResult<WalletSummary> {
        let wallet = WalletRepo::find_by_provider(conn, provider_id).await?;
        Ok(WalletSummary {
            wallet_id: wallet.as_ref().map(|w| w.id),
            provider_id,
            balances: wallet.map(|w| w.balances()).unwrap_or_default(),
        })
    }

    pub async fn history(
        conn: &mut PgConnection,
        provider_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> CoreResult<Vec<DbWalletTransaction>> {
        let Some(wallet) = WalletRepo::find_by_provider(&mut *conn, provider_id).await? else {
            return Ok(Vec::new());
        };
        Ok(WalletRepo::list_transactions(conn, wallet.id, limit, offset).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_settlement_amounts() {
        let applied = Settlement::Applied {
            movement: plan_movement(dec!(850), dec!(425), dec!(425)),
            wallet: DbWallet {
                id: Uuid::new_v4(),
                provider_id: Uuid::new_v4(),
                pending_balance: dec!(0),
                available_balance: dec!(425),
                created_at: chrono::Utc::now(),
                updated_at: chrono::Utc::now(),
            },
        };
        assert_eq!(applied.released(), dec!(425));
        assert_eq!(applied.refunded(), dec!(425));

        assert_eq!(Settlement::AlreadySettled.released(), Decimal::ZERO);
        assert!(Settlement::AlreadySettled.movement().is_none());
    }
}

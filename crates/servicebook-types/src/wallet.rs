//! Escrow wallet arithmetic
//!
//! Pure balance math. Persistence and locking live in the ledger; this module
//! only decides what a movement looks like and refuses negative balances.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::{DomainError, DomainResult};

/// Ledger transaction type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    PaymentReceived,
    Refund,
    Adjustment,
    Payout,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PaymentReceived => "payment_received",
            Self::Refund => "refund",
            Self::Adjustment => "adjustment",
            Self::Payout => "payout",
        }
    }
}

impl FromStr for TransactionType {
    type Err = DomainError;

    fn from_str(s: &str) -> DomainResult<Self> {
        match s {
            "payment_received" => Ok(Self::PaymentReceived),
            "refund" => Ok(Self::Refund),
            "adjustment" => Ok(Self::Adjustment),
            "payout" => Ok(Self::Payout),
            other => Err(DomainError::unknown("transaction type", other)),
        }
    }
}

/// Which wallet balance a transaction moved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceKind {
    Pending,
    Available,
}

impl BalanceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Available => "available",
        }
    }
}

impl FromStr for BalanceKind {
    type Err = DomainError;

    fn from_str(s: &str) -> DomainResult<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "available" => Ok(Self::Available),
            other => Err(DomainError::unknown("balance kind", other)),
        }
    }
}

/// Wallet balances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Balances {
    pub pending: Decimal,
    pub available: Decimal,
}

impl Balances {
    pub fn new(pending: Decimal, available: Decimal) -> Self {
        Self { pending, available }
    }

    pub fn get(&self, kind: BalanceKind) -> Decimal {
        match kind {
            BalanceKind::Pending => self.pending,
            BalanceKind::Available => self.available,
        }
    }

    /// Apply a signed admin delta to one balance
    pub fn apply_adjustment(&self, kind: BalanceKind, delta: Decimal) -> DomainResult<Balances> {
        if delta.is_zero() {
            return Err(DomainError::validation("adjustment amount must be non-zero"));
        }
        let next = self.get(kind) + delta;
        if next < Decimal::ZERO {
            return Err(DomainError::insufficient_balance(format!(
                "{} balance {} cannot absorb {}",
                kind.as_str(),
                self.get(kind),
                delta
            )));
        }
        let mut out = *self;
        match kind {
            BalanceKind::Pending => out.pending = next,
            BalanceKind::Available => out.available = next,
        }
        Ok(out)
    }

    /// Escrow a payment's net amount
    pub fn credit_pending(&self, amount: Decimal) -> DomainResult<Balances> {
        if amount <= Decimal::ZERO {
            return Err(DomainError::validation("credit amount must be positive"));
        }
        Ok(Balances {
            pending: self.pending + amount,
            available: self.available,
        })
    }
}

/// Funds leaving the pending balance for one payment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscrowMovement {
    /// Taken out of pending
    pub pending_debit: Decimal,
    /// Credited to available
    pub release: Decimal,
    /// Returned to the client
    pub refund: Decimal,
    /// Pending on hand was short of the requested amount
    pub clamped: bool,
}

/// Plan moving `release + refund` out of pending. When pending on hand is
/// short the debit is clamped, satisfying the release first.
pub fn plan_movement(pending_on_hand: Decimal, release: Decimal, refund: Decimal) -> EscrowMovement {
    let requested = release + refund;
    let on_hand = pending_on_hand.max(Decimal::ZERO);
    let pending_debit = requested.min(on_hand);
    let release_out = release.min(pending_debit);
    EscrowMovement {
        pending_debit,
        release: release_out,
        refund: pending_debit - release_out,
        clamped: pending_debit < requested,
    }
}

/// Idempotency references written to `wallet_transactions.reference_id`
pub mod reference {
    use uuid::Uuid;

    pub fn credit(payment_id: Uuid) -> String {
        format!("credit:{}", payment_id)
    }

    pub fn release(payment_id: Uuid) -> String {
        format!("release:{}", payment_id)
    }

    pub fn refund(payment_id: Uuid) -> String {
        format!("refund:{}", payment_id)
    }

    pub fn adjustment(id: Uuid) -> String {
        format!("adjust:{}", id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    #[test]
    fn test_adjustment_rejects_negative_balance() {
        let balances = Balances::new(dec!(10), dec!(5));
        let err = balances
            .apply_adjustment(BalanceKind::Available, dec!(-5.01))
            .unwrap_err();
        assert!(matches!(err, DomainError::InsufficientBalance(_)));

        let ok = balances.apply_adjustment(BalanceKind::Available, dec!(-5)).unwrap();
        assert_eq!(ok.available, dec!(0));
        assert_eq!(ok.pending, dec!(10));

        let ok = balances.apply_adjustment(BalanceKind::Pending, dec!(2.5)).unwrap();
        assert_eq!(ok.pending, dec!(12.5));
    }

    #[test]
    fn test_zero_adjustment_rejected() {
        assert!(Balances::default()
            .apply_adjustment(BalanceKind::Pending, Decimal::ZERO)
            .is_err());
    }

    #[test]
    fn test_full_release_movement() {
        let movement = plan_movement(dec!(850), dec!(850), dec!(0));
        assert_eq!(movement.pending_debit, dec!(850));
        assert_eq!(movement.release, dec!(850));
        assert_eq!(movement.refund, dec!(0));
        assert!(!movement.clamped);
    }

    #[test]
    fn test_full_refund_movement() {
        let movement = plan_movement(dec!(850), dec!(0), dec!(850));
        assert_eq!(movement.pending_debit, dec!(850));
        assert_eq!(movement.refund, dec!(850));
        assert_eq!(movement.release, dec!(0));
    }

    #[test]
    fn test_short_pending_clamps_refund_first() {
        let movement = plan_movement(dec!(500), dec!(425), dec!(425));
        assert!(movement.clamped);
        assert_eq!(movement.pending_debit, dec!(500));
        assert_eq!(movement.release, dec!(425));
        assert_eq!(movement.refund, dec!(75));

        let movement = plan_movement(dec!(300), dec!(425), dec!(425));
        assert_eq!(movement.release, dec!(300));
        assert_eq!(movement.refund, dec!(0));
        assert_eq!(movement.pending_debit, dec!(300));

        let movement = plan_movement(dec!(-5), dec!(425), dec!(0));
        assert_eq!(movement.pending_debit, dec!(0));
        assert!(movement.clamped);
    }

    #[test]
    fn test_references() {
        let id = Uuid::nil();
        assert_eq!(
            reference::release(id),
            "release:00000000-0000-0000-0000-000000000000"
        );
        assert_ne!(reference::credit(id), reference::refund(id));
    }
}

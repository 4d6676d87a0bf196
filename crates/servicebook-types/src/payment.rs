//! Payment rules
//!
//! Commission math, the deterministic idempotency key and the mapping of
//! gateway intent statuses onto local payment statuses.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::str::FromStr;
use uuid::Uuid;

use crate::{round_money, BookingStatus, DomainError, DomainResult};

/// Local payment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Succeeded,
    Failed,
    Refunded,
    PartiallyRefunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
            Self::PartiallyRefunded => "partially_refunded",
        }
    }

    /// Intent exists at the gateway and has not settled
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }

    /// Money was captured at some point
    pub fn was_captured(&self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Refunded | Self::PartiallyRefunded
        )
    }

    /// Map a gateway intent status. Statuses that still need client action
    /// count as pending.
    pub fn from_gateway(status: &str) -> Self {
        match status {
            "succeeded" => Self::Succeeded,
            "processing" => Self::Processing,
            "canceled" | "cancelled" | "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> DomainResult<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            "refunded" => Ok(Self::Refunded),
            "partially_refunded" => Ok(Self::PartiallyRefunded),
            other => Err(DomainError::unknown("payment status", other)),
        }
    }
}

/// Gross amount split into platform commission and provider net
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionSplit {
    pub gross: Decimal,
    pub rate: Decimal,
    pub commission: Decimal,
    pub net: Decimal,
}

impl CommissionSplit {
    pub fn compute(gross: Decimal, rate: Decimal) -> DomainResult<Self> {
        if gross <= Decimal::ZERO {
            return Err(DomainError::validation("payment amount must be positive"));
        }
        if rate < Decimal::ZERO || rate >= Decimal::ONE {
            return Err(DomainError::validation("commission rate must be in [0, 1)"));
        }
        let commission = round_money(gross * rate);
        Ok(Self {
            gross,
            rate,
            commission,
            net: gross - commission,
        })
    }
}

/// Deterministic key for intent creation: hex sha256 of
/// `booking:{booking_id}:client:{client_id}`
pub fn idempotency_key(booking_id: Uuid, client_id: Uuid) -> String {
    let digest = Sha256::digest(format!("booking:{}:client:{}", booking_id, client_id).as_bytes());
    hex::encode(digest)
}

/// Amount in the currency's minor unit (cents)
pub fn to_minor_units(amount: Decimal) -> DomainResult<i64> {
    (round_money(amount) * Decimal::ONE_HUNDRED)
        .trunc()
        .to_i64()
        .ok_or_else(|| DomainError::validation("amount out of range"))
}

/// What create-intent should do given the booking's existing payment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentDecision {
    /// No payment yet: insert one
    CreateNew,
    /// An intent is in flight: hand it back
    ReuseExisting,
    /// The previous attempt failed: new intent on the same row
    Rearm,
    /// Already paid
    AlreadyPaid,
}

pub fn decide_intent(existing: Option<PaymentStatus>) -> IntentDecision {
    match existing {
        None => IntentDecision::CreateNew,
        Some(status) if status.is_in_flight() => IntentDecision::ReuseExisting,
        Some(PaymentStatus::Failed) => IntentDecision::Rearm,
        Some(_) => IntentDecision::AlreadyPaid,
    }
}

/// What a newly captured payment does to escrow, given where its booking
/// already is. Captures can land after the booking has moved on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureEscrow {
    /// Held in pending until confirmation or dispute resolution
    Hold,
    /// Booking already completed: release straight to available
    Release,
    /// Booking cancelled or rejected: refund the whole net amount
    Refund,
}

impl CaptureEscrow {
    pub fn for_booking(status: BookingStatus) -> Self {
        match status {
            BookingStatus::Completed => Self::Release,
            BookingStatus::Cancelled | BookingStatus::Rejected => Self::Refund,
            _ => Self::Hold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_commission_split() {
        let split = CommissionSplit::compute(dec!(1000), dec!(0.15)).unwrap();
        assert_eq!(split.commission, dec!(150.00));
        assert_eq!(split.net, dec!(850.00));
    }

    #[test]
    fn test_commission_rounds_half_away_from_zero() {
        // 33.33 * 0.15 = 4.9995
        let split = CommissionSplit::compute(dec!(33.33), dec!(0.15)).unwrap();
        assert_eq!(split.commission, dec!(5.00));
        assert_eq!(split.net, dec!(28.33));
        assert_eq!(split.commission + split.net, split.gross);
    }

    #[test]
    fn test_commission_rejects_bad_input() {
        assert!(CommissionSplit::compute(dec!(0), dec!(0.15)).is_err());
        assert!(CommissionSplit::compute(dec!(100), dec!(1)).is_err());
        assert!(CommissionSplit::compute(dec!(100), dec!(-0.1)).is_err());
    }

    #[test]
    fn test_idempotency_key_is_deterministic() {
        let booking = Uuid::new_v4();
        let client = Uuid::new_v4();
        let key = idempotency_key(booking, client);
        assert_eq!(key, idempotency_key(booking, client));
        assert_eq!(key.len(), 64);
        assert_ne!(key, idempotency_key(booking, Uuid::new_v4()));
    }

    #[test]
    fn test_minor_units() {
        assert_eq!(to_minor_units(dec!(1000)).unwrap(), 100_000);
        assert_eq!(to_minor_units(dec!(12.345)).unwrap(), 1235);
    }

    #[test]
    fn test_capture_escrow_follows_booking() {
        assert_eq!(CaptureEscrow::for_booking(BookingStatus::Accepted), CaptureEscrow::Hold);
        assert_eq!(
            CaptureEscrow::for_booking(BookingStatus::AwaitingConfirmation),
            CaptureEscrow::Hold
        );
        assert_eq!(CaptureEscrow::for_booking(BookingStatus::Disputed), CaptureEscrow::Hold);
        assert_eq!(CaptureEscrow::for_booking(BookingStatus::Completed), CaptureEscrow::Release);
        assert_eq!(CaptureEscrow::for_booking(BookingStatus::Cancelled), CaptureEscrow::Refund);
        assert_eq!(CaptureEscrow::for_booking(BookingStatus::Rejected), CaptureEscrow::Refund);
    }

    #[test]
    fn test_decide_intent() {
        assert_eq!(decide_intent(None), IntentDecision::CreateNew);
        assert_eq!(decide_intent(Some(PaymentStatus::Pending)), IntentDecision::ReuseExisting);
        assert_eq!(decide_intent(Some(PaymentStatus::Processing)), IntentDecision::ReuseExisting);
        assert_eq!(decide_intent(Some(PaymentStatus::Failed)), IntentDecision::Rearm);
        assert_eq!(decide_intent(Some(PaymentStatus::Succeeded)), IntentDecision::AlreadyPaid);
        assert_eq!(decide_intent(Some(PaymentStatus::Refunded)), IntentDecision::AlreadyPaid);
    }

    #[test]
    fn test_gateway_status_mapping() {
        assert_eq!(PaymentStatus::from_gateway("succeeded"), PaymentStatus::Succeeded);
        assert_eq!(PaymentStatus::from_gateway("requires_payment_method"), PaymentStatus::Pending);
        assert_eq!(PaymentStatus::from_gateway("canceled"), PaymentStatus::Failed);
    }
}

//! Dispute resolution rules

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::{round_money, BookingStatus, DomainError, DomainResult, PaymentStatus};

/// Side an admin rules for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeFavor {
    Client,
    Provider,
}

impl DisputeFavor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Provider => "provider",
        }
    }

    /// Refund percentage used when the admin gives none
    pub fn default_refund_percentage(&self) -> Decimal {
        match self {
            Self::Client => Decimal::ONE_HUNDRED,
            Self::Provider => Decimal::ZERO,
        }
    }

    /// Booking status after resolution
    pub fn final_status(&self) -> BookingStatus {
        match self {
            Self::Client => BookingStatus::Cancelled,
            Self::Provider => BookingStatus::Completed,
        }
    }
}

impl FromStr for DisputeFavor {
    type Err = DomainError;

    fn from_str(s: &str) -> DomainResult<Self> {
        match s {
            "client" => Ok(Self::Client),
            "provider" => Ok(Self::Provider),
            other => Err(DomainError::unknown("dispute favor", other)),
        }
    }
}

/// Net provider amount split between client refund and provider release.
/// `refund + release == net` exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementSplit {
    pub net: Decimal,
    pub refund_percentage: Decimal,
    pub refund: Decimal,
    pub release: Decimal,
}

/// Refund percentages are bounded to `[0, 100]`
pub fn validate_refund_percentage(pct: Decimal) -> DomainResult<Decimal> {
    if pct < Decimal::ZERO || pct > Decimal::ONE_HUNDRED {
        return Err(DomainError::validation(
            "refund percentage must be between 0 and 100",
        ));
    }
    // Stored with two decimals; the split must use the stored value
    Ok(round_money(pct))
}

impl SettlementSplit {
    pub fn new(net: Decimal, refund_percentage: Decimal) -> DomainResult<Self> {
        let refund_percentage = validate_refund_percentage(refund_percentage)?;
        let refund = round_money(net * refund_percentage / Decimal::ONE_HUNDRED);
        Ok(Self {
            net,
            refund_percentage,
            refund,
            release: net - refund,
        })
    }

    /// Provider keeps everything
    pub fn full_release(net: Decimal) -> Self {
        Self {
            net,
            refund_percentage: Decimal::ZERO,
            refund: Decimal::ZERO,
            release: net,
        }
    }

    /// Client gets everything back
    pub fn full_refund(net: Decimal) -> Self {
        Self {
            net,
            refund_percentage: Decimal::ONE_HUNDRED,
            refund: net,
            release: Decimal::ZERO,
        }
    }

    /// Payment status after the split is applied. `None` leaves it unchanged.
    pub fn payment_status(&self) -> Option<PaymentStatus> {
        if self.refund_percentage == Decimal::ONE_HUNDRED {
            Some(PaymentStatus::Refunded)
        } else if self.refund_percentage > Decimal::ZERO {
            Some(PaymentStatus::PartiallyRefunded)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_client_favor_full_refund() {
        let favor = DisputeFavor::Client;
        let split = SettlementSplit::new(dec!(850), favor.default_refund_percentage()).unwrap();
        assert_eq!(split.refund, dec!(850.00));
        assert_eq!(split.release, dec!(0));
        assert_eq!(split.payment_status(), Some(PaymentStatus::Refunded));
        assert_eq!(favor.final_status(), BookingStatus::Cancelled);
    }

    #[test]
    fn test_provider_favor_keeps_payment_status() {
        let favor = DisputeFavor::Provider;
        let split = SettlementSplit::new(dec!(850), favor.default_refund_percentage()).unwrap();
        assert_eq!(split.release, dec!(850));
        assert_eq!(split.payment_status(), None);
        assert_eq!(favor.final_status(), BookingStatus::Completed);
    }

    #[test]
    fn test_partial_split_sums_to_net() {
        for pct in [dec!(1), dec!(33), dec!(33.3), dec!(50), dec!(66.67), dec!(99)] {
            let split = SettlementSplit::new(dec!(28.33), pct).unwrap();
            assert_eq!(split.refund + split.release, dec!(28.33));
            assert_eq!(split.payment_status(), Some(PaymentStatus::PartiallyRefunded));
        }
    }

    #[test]
    fn test_partial_split_rounding() {
        // 28.33 * 0.5 = 14.165 -> 14.17
        let split = SettlementSplit::new(dec!(28.33), dec!(50)).unwrap();
        assert_eq!(split.refund, dec!(14.17));
        assert_eq!(split.release, dec!(14.16));
    }

    #[test]
    fn test_percentage_is_split_as_stored() {
        assert_eq!(validate_refund_percentage(dec!(33.333)).unwrap(), dec!(33.33));

        // 900 * 33.33% = 299.97, not 299.997 -> 300.00
        let split = SettlementSplit::new(dec!(900), dec!(33.333)).unwrap();
        assert_eq!(split.refund_percentage, dec!(33.33));
        assert_eq!(split.refund, dec!(299.97));
        assert_eq!(split.release, dec!(600.03));

        let nearly_all = SettlementSplit::new(dec!(900), dec!(99.999)).unwrap();
        assert_eq!(nearly_all.refund_percentage, dec!(100.00));
        assert_eq!(nearly_all.payment_status(), Some(PaymentStatus::Refunded));

        let nearly_none = SettlementSplit::new(dec!(900), dec!(0.004)).unwrap();
        assert_eq!(nearly_none.refund, dec!(0.00));
        assert_eq!(nearly_none.payment_status(), None);
    }

    #[test]
    fn test_percentage_bounds() {
        assert!(SettlementSplit::new(dec!(100), dec!(-1)).is_err());
        assert!(SettlementSplit::new(dec!(100), dec!(100.01)).is_err());
        assert!(SettlementSplit::new(dec!(100), dec!(100)).is_ok());
    }

    #[test]
    fn test_helpers_match_new() {
        assert_eq!(
            SettlementSplit::full_release(dec!(10)).release,
            SettlementSplit::new(dec!(10), dec!(0)).unwrap().release
        );
        assert_eq!(
            SettlementSplit::full_refund(dec!(10)).refund,
            SettlementSplit::new(dec!(10), dec!(100)).unwrap().refund
        );
    }
}

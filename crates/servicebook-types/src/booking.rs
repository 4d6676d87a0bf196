//! Booking lifecycle rules
//!
//! The status graph, half-open booking intervals and the pricing floor
//! enforced at creation.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::{round_money, DomainError, DomainResult};

// =============================================================================
// Status
// =============================================================================

/// Booking status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Requested by the client, waiting for the provider
    Pending,
    /// Accepted by the provider (or created in instant mode)
    Accepted,
    /// Reconfirmed by the provider
    Confirmed,
    /// Declined by the provider
    Rejected,
    /// Cancelled by a participant or by dispute resolution
    Cancelled,
    /// Provider reported completion, client has to confirm
    AwaitingConfirmation,
    /// Client disputed the completion
    Disputed,
    /// Done, escrow released
    Completed,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 8] = [
        Self::Pending,
        Self::Accepted,
        Self::Confirmed,
        Self::Rejected,
        Self::Cancelled,
        Self::AwaitingConfirmation,
        Self::Disputed,
        Self::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Confirmed => "confirmed",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
            Self::AwaitingConfirmation => "awaiting_confirmation",
            Self::Disputed => "disputed",
            Self::Completed => "completed",
        }
    }

    /// No further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Rejected)
    }

    /// Whether a booking in this status occupies the provider's schedule
    pub fn blocks_schedule(&self) -> bool {
        !matches!(self, Self::Cancelled | Self::Rejected)
    }

    /// Provider has committed to the slot
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Accepted | Self::Confirmed)
    }

    /// Statuses from which a participant may reschedule
    pub fn can_reschedule(&self) -> bool {
        matches!(self, Self::Pending | Self::Accepted | Self::Confirmed)
    }

    /// Statuses from which a participant may cancel
    pub fn can_participant_cancel(&self) -> bool {
        matches!(self, Self::Pending | Self::Accepted | Self::Confirmed)
    }

    /// Lifecycle edges. Nothing ever returns to `pending`.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        match (self, next) {
            (Pending, Accepted | Rejected | Cancelled) => true,
            (Accepted, Confirmed) => true,
            (Accepted | Confirmed, AwaitingConfirmation | Cancelled | Completed) => true,
            (AwaitingConfirmation, Completed | Disputed) => true,
            (Disputed, Completed | Cancelled) => true,
            _ => false,
        }
    }

    /// Check a transition, reporting the rejected edge
    pub fn transition_to(&self, next: BookingStatus) -> DomainResult<BookingStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(DomainError::InvalidTransition {
                from: self.as_str().to_string(),
                to: next.as_str().to_string(),
            })
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> DomainResult<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::unknown("booking status", s))
    }
}

/// How a booking enters the lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingMode {
    /// Accepted on creation
    Instant,
    /// Waits for the provider
    #[default]
    Request,
}

impl BookingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Instant => "instant",
            Self::Request => "request",
        }
    }

    /// Status a freshly created booking starts in
    pub fn initial_status(&self) -> BookingStatus {
        match self {
            Self::Instant => BookingStatus::Accepted,
            Self::Request => BookingStatus::Pending,
        }
    }
}

impl FromStr for BookingMode {
    type Err = DomainError;

    fn from_str(s: &str) -> DomainResult<Self> {
        match s {
            "instant" => Ok(Self::Instant),
            "request" => Ok(Self::Request),
            other => Err(DomainError::unknown("booking mode", other)),
        }
    }
}

/// Kind of completion evidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceType {
    Before,
    After,
    #[default]
    Other,
}

impl EvidenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::After => "after",
            Self::Other => "other",
        }
    }
}

impl FromStr for EvidenceType {
    type Err = DomainError;

    fn from_str(s: &str) -> DomainResult<Self> {
        match s {
            "before" => Ok(Self::Before),
            "after" => Ok(Self::After),
            "other" => Ok(Self::Other),
            other => Err(DomainError::unknown("evidence type", other)),
        }
    }
}

// =============================================================================
// Interval
// =============================================================================

/// Half-open time interval `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Interval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> DomainResult<Self> {
        if end <= start {
            return Err(DomainError::validation("end time must be after start time"));
        }
        Ok(Self { start, end })
    }

    /// Build from a start and either an explicit end or a duration in minutes.
    /// An explicit end wins.
    pub fn resolve(
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
        duration_minutes: Option<i32>,
    ) -> DomainResult<Self> {
        let end = match (end, duration_minutes) {
            (Some(end), _) => end,
            (None, Some(minutes)) if minutes > 0 => start + Duration::minutes(i64::from(minutes)),
            (None, Some(_)) => {
                return Err(DomainError::validation("service duration must be positive"))
            }
            (None, None) => {
                return Err(DomainError::validation(
                    "end time is required when the service has no duration",
                ))
            }
        };
        Self::new(start, end)
    }

    /// Adjacent intervals do not overlap
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && self.end > other.start
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// First and last calendar dates (UTC) touched by the interval, inclusive
    pub fn date_span(&self) -> (NaiveDate, NaiveDate) {
        // The end instant itself is excluded
        let last = (self.end - Duration::nanoseconds(1)).date_naive();
        (self.start.date_naive(), last)
    }
}

// =============================================================================
// Pricing
// =============================================================================

/// How a service is priced in the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingType {
    #[default]
    Fixed,
    Hourly,
}

impl PricingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Hourly => "hourly",
        }
    }

    /// Catalog values other than `hourly` are treated as fixed
    pub fn from_catalog(value: &str) -> Self {
        if value.eq_ignore_ascii_case("hourly") {
            Self::Hourly
        } else {
            Self::Fixed
        }
    }
}

/// Smallest total a client may be charged for a service
pub fn price_floor(service_price: Decimal, commission_rate: Decimal) -> Decimal {
    round_money(service_price * (Decimal::ONE + commission_rate))
}

/// Reject totals below the service price plus commission.
/// Hourly services are billed elsewhere and skip the check.
pub fn check_price_floor(
    total_price: Decimal,
    service_price: Decimal,
    pricing: PricingType,
    commission_rate: Decimal,
) -> DomainResult<()> {
    if total_price <= Decimal::ZERO {
        return Err(DomainError::validation("total price must be positive"));
    }
    if pricing == PricingType::Hourly {
        return Ok(());
    }
    let floor = price_floor(service_price, commission_rate);
    if total_price < floor {
        return Err(DomainError::validation(format!(
            "total price {} is below the minimum {}",
            total_price, floor
        )));
    }
    Ok(())
}

/// Disputes need a reason of at least `min_len` characters
pub fn validate_dispute_reason(reason: Option<&str>, min_len: usize) -> DomainResult<String> {
    let reason = reason.map(str::trim).unwrap_or_default();
    if reason.chars().count() < min_len {
        return Err(DomainError::validation(format!(
            "dispute reason must be at least {} characters",
            min_len
        )));
    }
    Ok(reason.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 10, h, m, 0).unwrap()
    }

    #[test]
    fn test_nothing_returns_to_pending() {
        for status in BookingStatus::ALL {
            assert!(!status.can_transition_to(BookingStatus::Pending), "{status}");
        }
    }

    #[test]
    fn test_terminal_statuses_have_no_exits() {
        for from in BookingStatus::ALL.iter().filter(|s| s.is_terminal()) {
            for to in BookingStatus::ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn test_lifecycle_edges() {
        use BookingStatus::*;
        assert!(Pending.can_transition_to(Accepted));
        assert!(Accepted.can_transition_to(Confirmed));
        assert!(Confirmed.can_transition_to(AwaitingConfirmation));
        assert!(AwaitingConfirmation.can_transition_to(Disputed));
        assert!(Disputed.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(AwaitingConfirmation));
        assert!(!AwaitingConfirmation.can_transition_to(Cancelled));
        assert!(!Confirmed.can_transition_to(Accepted));

        let err = Completed.transition_to(Pending).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in BookingStatus::ALL {
            assert_eq!(status.as_str().parse::<BookingStatus>().unwrap(), status);
        }
        assert!("archived".parse::<BookingStatus>().is_err());
    }

    #[test]
    fn test_mode_initial_status() {
        assert_eq!(BookingMode::Instant.initial_status(), BookingStatus::Accepted);
        assert_eq!(BookingMode::Request.initial_status(), BookingStatus::Pending);
    }

    #[test]
    fn test_end_resolved_from_duration() {
        let interval = Interval::resolve(at(10, 0), None, Some(60)).unwrap();
        assert_eq!(interval.end, at(11, 0));
    }

    #[test]
    fn test_explicit_end_wins_over_duration() {
        let interval = Interval::resolve(at(10, 0), Some(at(10, 30)), Some(60)).unwrap();
        assert_eq!(interval.end, at(10, 30));
    }

    #[test]
    fn test_end_must_follow_start() {
        assert!(Interval::new(at(10, 0), at(10, 0)).is_err());
        assert!(Interval::new(at(10, 0), at(9, 0)).is_err());
        assert!(Interval::resolve(at(10, 0), None, None).is_err());
        assert!(Interval::resolve(at(10, 0), None, Some(0)).is_err());
    }

    #[test]
    fn test_overlap_is_half_open() {
        let booked = Interval::new(at(10, 0), at(11, 0)).unwrap();
        let overlapping = Interval::new(at(10, 30), at(11, 30)).unwrap();
        let adjacent = Interval::new(at(11, 0), at(12, 0)).unwrap();
        let before = Interval::new(at(9, 0), at(10, 0)).unwrap();
        let inside = Interval::new(at(10, 15), at(10, 45)).unwrap();

        assert!(booked.overlaps(&overlapping));
        assert!(overlapping.overlaps(&booked));
        assert!(booked.overlaps(&inside));
        assert!(!booked.overlaps(&adjacent));
        assert!(!booked.overlaps(&before));
    }

    #[test]
    fn test_date_span_excludes_end_instant() {
        let day = at(0, 0).date_naive();
        let same_day = Interval::new(at(10, 0), at(11, 0)).unwrap();
        assert_eq!(same_day.date_span(), (day, day));

        let to_midnight = Interval::new(
            at(22, 0),
            Utc.with_ymd_and_hms(2025, 1, 11, 0, 0, 0).unwrap(),
        )
        .unwrap();
        assert_eq!(to_midnight.date_span(), (day, day));

        let overnight = Interval::new(
            at(22, 0),
            Utc.with_ymd_and_hms(2025, 1, 11, 2, 0, 0).unwrap(),
        )
        .unwrap();
        assert_eq!(overnight.date_span().1, day.succ_opt().unwrap());
    }

    #[test]
    fn test_date_span_of_a_long_interval() {
        let decades = Interval::new(
            at(9, 0),
            Utc.with_ymd_and_hms(2125, 1, 10, 9, 0, 0).unwrap(),
        )
        .unwrap();
        let (first, last) = decades.date_span();
        assert_eq!(first, at(0, 0).date_naive());
        assert_eq!(last, NaiveDate::from_ymd_opt(2125, 1, 10).unwrap());
    }

    #[test]
    fn test_price_floor() {
        // 100 * 1.15 = 115.00
        assert!(check_price_floor(dec!(115.00), dec!(100), PricingType::Fixed, dec!(0.15)).is_ok());
        assert!(check_price_floor(dec!(114.99), dec!(100), PricingType::Fixed, dec!(0.15)).is_err());
        assert!(check_price_floor(dec!(50), dec!(100), PricingType::Hourly, dec!(0.15)).is_ok());
        assert!(check_price_floor(dec!(0), dec!(0), PricingType::Hourly, dec!(0.15)).is_err());
    }

    #[test]
    fn test_pricing_type_from_catalog() {
        assert_eq!(PricingType::from_catalog("hourly"), PricingType::Hourly);
        assert_eq!(PricingType::from_catalog("HOURLY"), PricingType::Hourly);
        assert_eq!(PricingType::from_catalog("package"), PricingType::Fixed);
    }

    #[test]
    fn test_dispute_reason_length() {
        assert!(validate_dispute_reason(None, 10).is_err());
        assert!(validate_dispute_reason(Some("   short   "), 10).is_err());
        assert_eq!(
            validate_dispute_reason(Some(" item never arrived at venue "), 10).unwrap(),
            "item never arrived at venue"
        );
    }
}

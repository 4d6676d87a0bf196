//! Engine configuration
//!
//! Each section deserializes with defaults so the server can embed them
//! directly in its layered configuration.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use servicebook_types::ReconcilePolicy;

use crate::resolver::IdentityMapping;

/// Booking and money rules
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BookingConfig {
    /// Platform commission as a fraction of the gross amount
    pub commission_rate: Decimal,
    /// Hours after provider completion before the client is warned
    pub warning_hours: i64,
    /// Hours after provider completion before the booking auto-confirms
    pub auto_confirm_hours: i64,
    /// Days an open dispute waits before resolving for the provider
    pub dispute_timeout_days: i64,
    /// Reschedules allowed per booking
    pub max_reschedules: i32,
    /// Minimum dispute reason length in characters
    pub min_dispute_reason_len: usize,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            commission_rate: Decimal::new(15, 2),
            warning_hours: 24,
            auto_confirm_hours: 48,
            dispute_timeout_days: 7,
            max_reschedules: 3,
            min_dispute_reason_len: 10,
        }
    }
}

impl BookingConfig {
    pub fn reconcile_policy(&self) -> ReconcilePolicy {
        ReconcilePolicy::from_hours(
            self.warning_hours,
            self.auto_confirm_hours,
            self.dispute_timeout_days,
        )
    }
}

/// Payment gateway settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentsConfig {
    /// Gateway API base URL
    pub gateway_url: String,
    /// Bearer key for the gateway
    pub api_key: String,
    /// Shared secret for webhook signatures
    pub webhook_secret: String,
    /// Maximum webhook timestamp age in seconds; 0 disables the check
    pub webhook_tolerance_secs: u64,
    /// Payment method types offered on new intents
    pub payment_method_types: Vec<String>,
    /// ISO currency code
    pub currency: String,
    /// Gateway request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            gateway_url: "http://localhost:12111/v1".to_string(),
            api_key: String::new(),
            webhook_secret: String::new(),
            webhook_tolerance_secs: 300,
            payment_method_types: vec!["card".to_string()],
            currency: "usd".to_string(),
            request_timeout_secs: 15,
        }
    }
}

/// Notification delivery
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    /// Messaging service endpoint; notifications are only logged when unset
    pub webhook_url: Option<String>,
    /// Delivery timeout in seconds
    pub timeout_secs: Option<u64>,
}

/// Identity column interpretation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Overrides the mode recorded in `schema_meta`
    pub identity_mode: Option<IdentityMapping>,
}

/// Background reconciler schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    pub enabled: bool,
    /// Seconds between runs
    pub interval_secs: u64,
    /// Candidates fetched per job and run
    pub batch_size: i64,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 300,
            batch_size: 100,
        }
    }
}

/// Everything the engine needs at runtime
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub booking: BookingConfig,
    pub payments: PaymentsConfig,
    pub reconciler: ReconcilerConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_booking_defaults() {
        let config = BookingConfig::default();
        assert_eq!(config.commission_rate, Decimal::new(15, 2));
        assert_eq!(config.max_reschedules, 3);

        let policy = config.reconcile_policy();
        assert_eq!(policy.auto_confirm_after, Duration::hours(48));
        assert_eq!(policy.warning_after, Duration::hours(24));
        assert_eq!(policy.dispute_timeout, Duration::days(7));
    }

    #[test]
    fn test_partial_section_keeps_defaults() {
        let config: PaymentsConfig =
            serde_json::from_str(r#"{"webhook_secret": "whsec_test"}"#).unwrap();
        assert_eq!(config.webhook_secret, "whsec_test");
        assert_eq!(config.webhook_tolerance_secs, 300);
        assert_eq!(config.payment_method_types, vec!["card".to_string()]);
    }

    #[test]
    fn test_identity_mode_parses() {
        let config: SchemaConfig =
            serde_json::from_str(r#"{"identity_mode": "indirect"}"#).unwrap();
        assert_eq!(config.identity_mode, Some(IdentityMapping::Indirect));
    }
}

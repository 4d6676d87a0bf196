//! Timeout windows driving the background reconciler

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Timeouts for confirmation and disputes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilePolicy {
    /// Client is warned this long after provider completion
    pub warning_after: Duration,
    /// Booking auto-confirms this long after provider completion
    pub auto_confirm_after: Duration,
    /// Open disputes auto-resolve for the provider after this long
    pub dispute_timeout: Duration,
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        Self {
            warning_after: Duration::hours(24),
            auto_confirm_after: Duration::hours(48),
            dispute_timeout: Duration::days(7),
        }
    }
}

/// Where a booking awaiting confirmation sits in its window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationWindow {
    Open,
    Warn,
    Expired,
}

impl ReconcilePolicy {
    pub fn from_hours(warning_hours: i64, auto_confirm_hours: i64, dispute_days: i64) -> Self {
        Self {
            warning_after: Duration::hours(warning_hours),
            auto_confirm_after: Duration::hours(auto_confirm_hours),
            dispute_timeout: Duration::days(dispute_days),
        }
    }

    /// The auto-confirm window is closed: a booking exactly at the limit is
    /// still in `Warn`
    pub fn classify(&self, provider_completed_at: DateTime<Utc>, now: DateTime<Utc>) -> ConfirmationWindow {
        let age = now - provider_completed_at;
        if age > self.auto_confirm_after {
            ConfirmationWindow::Expired
        } else if age >= self.warning_after {
            ConfirmationWindow::Warn
        } else {
            ConfirmationWindow::Open
        }
    }

    /// Latest completion time that is due for a warning
    pub fn warning_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.warning_after
    }

    /// Completions strictly before this are due for auto-confirm
    pub fn auto_confirm_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.auto_confirm_after
    }

    /// Latest dispute time that is due for auto-resolve
    pub fn dispute_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.dispute_timeout
    }

    pub fn dispute_expired(&self, dispute_raised_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now - dispute_raised_at >= self.dispute_timeout
    }
}

/// Outcome counts of one reconciler pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub warned: u32,
    pub auto_confirmed: u32,
    pub auto_resolved: u32,
    pub failed: u32,
}

impl ReconcileReport {
    pub fn total_actions(&self) -> u32 {
        self.warned + self.auto_confirmed + self.auto_resolved
    }
}

//! Metric registration and recording helpers

use metrics::describe_counter;

pub const BOOKINGS_CREATED: &str = "servicebook_bookings_created_total";
pub const PAYMENTS_SUCCEEDED: &str = "servicebook_payments_succeeded_total";
pub const ESCROW_RELEASED: &str = "servicebook_escrow_released_total";
pub const RECONCILER_ACTIONS: &str = "servicebook_reconciler_actions_total";
pub const RECONCILER_FAILURES: &str = "servicebook_reconciler_failures_total";

/// Register metric descriptions. Called once after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(BOOKINGS_CREATED, "Bookings created");
    describe_counter!(PAYMENTS_SUCCEEDED, "Payments that reached succeeded");
    describe_counter!(ESCROW_RELEASED, "Escrow releases from pending to available");
    describe_counter!(RECONCILER_ACTIONS, "Reconciler actions by job");
    describe_counter!(RECONCILER_FAILURES, "Reconciler candidate failures by job");
}

pub fn record_booking_created(mode: &'static str) {
    metrics::counter!(BOOKINGS_CREATED, "mode" => mode).increment(1);
}

pub fn record_payment_succeeded() {
    metrics::counter!(PAYMENTS_SUCCEEDED).increment(1);
}

pub fn record_escrow_released() {
    metrics::counter!(ESCROW_RELEASED).increment(1);
}

pub fn record_reconciler_action(job: &'static str) {
    metrics::counter!(RECONCILER_ACTIONS, "job" => job).increment(1);
}

pub fn record_reconciler_failure(job: &'static str) {
    metrics::counter!(RECONCILER_FAILURES, "job" => job).increment(1);
}

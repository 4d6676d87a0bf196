//! Servicebook Types - Canonical domain types for the booking escrow engine
//!
//! This crate holds the rules of the system with no I/O attached:
//!
//! - **Booking lifecycle**: statuses, allowed transitions, half-open intervals
//! - **Payments**: commission split, idempotency keys, gateway status mapping
//! - **Escrow**: wallet balance arithmetic and settlement planning
//! - **Disputes**: refund/release splits and final outcomes
//! - **Reconciliation**: confirmation and dispute timeout windows
//!
//! # Invariants
//!
//! 1. Wallet balances never go negative
//! 2. Booking intervals are half-open with `end > start`
//! 3. A status can never move back to `pending`
//! 4. `refund + release == net` for every settlement split

pub mod booking;
pub mod dispute;
pub mod error;
pub mod payment;
pub mod reconcile;
pub mod role;
pub mod wallet;

pub use booking::*;
pub use dispute::*;
pub use error::{DomainError, DomainResult};
pub use payment::*;
pub use reconcile::*;
pub use role::*;
pub use wallet::*;

use rust_decimal::{Decimal, RoundingStrategy};

/// Round a monetary amount to two decimal places, midpoint away from zero
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

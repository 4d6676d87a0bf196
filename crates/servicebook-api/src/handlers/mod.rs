//! API Handlers

pub mod bookings;
pub mod health;
pub mod payments;
pub mod wallet;

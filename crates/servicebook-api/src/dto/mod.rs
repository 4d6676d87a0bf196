//! Request and response types

mod booking;
mod common;
mod payment;
mod wallet;

pub use booking::*;
pub use common::*;
pub use payment::*;
pub use wallet::*;

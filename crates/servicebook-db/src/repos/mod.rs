//! Repository implementations

mod booking;
mod catalog;
mod dispute;
mod evidence;
mod identity;
mod payment;
mod wallet;

pub use booking::BookingRepo;
pub use catalog::{AvailabilityRepo, ServiceRepo};
pub use dispute::DisputeAuditRepo;
pub use evidence::EvidenceRepo;
pub use identity::IdentityRepo;
pub use payment::PaymentRepo;
pub use wallet::WalletRepo;

//! Servicebook Engine
//!
//! Booking lifecycle, conflict scheduling, escrow wallet ledger, payment
//! orchestration, dispute resolution and the temporal reconciler.
//!
//! # Unit of work
//!
//! Every mutating operation follows the same shape:
//!
//! ```text
//! begin tx ─▶ lock (provider advisory / booking row / wallet row)
//!          ─▶ validate under lock ─▶ write ─▶ collect SideEffects
//!          ─▶ commit ─▶ dispatch SideEffects to the Notifier
//! ```
//!
//! Any error before commit drops the transaction, which rolls it back.
//! Notification failures after commit are logged and never undo anything.

pub mod bookings;
pub mod catalog;
pub mod config;
pub mod disputes;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod notify;
pub mod payments;
pub mod reconciler;
pub mod resolver;
pub mod scheduler;
pub mod wallets;

pub use bookings::{
    BookingService, CompleteBooking, ConfirmBooking, CreateBooking, EvidenceInput, Page,
    RescheduleBooking, UpdateStatus,
};
pub use catalog::{PgServiceCatalog, ServiceCatalog, ServiceInfo};
pub use config::{
    BookingConfig, EngineConfig, NotificationsConfig, PaymentsConfig, ReconcilerConfig,
    SchemaConfig,
};
pub use disputes::{DisputeEngine, ResolveDispute};
pub use engine::{Engine, EngineContext};
pub use error::{CoreError, CoreResult};
pub use ledger::{EscrowLedger, Settlement, WalletSummary};
pub use notify::{
    notifier_from_config, Notification, NotificationKind, Notifier, SideEffects, TracingNotifier,
    WebhookNotifier,
};
pub use payments::{
    GatewayIntent, HttpGateway, PaymentGateway, PaymentIntent, PaymentOrchestrator,
    WebhookOutcome,
};
pub use reconciler::Reconciler;
pub use resolver::{IdentityMapping, SchemaResolver};
pub use scheduler::ConflictScheduler;
pub use wallets::{AdjustWallet, WalletService};

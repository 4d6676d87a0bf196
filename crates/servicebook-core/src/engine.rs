//! Engine wiring
//!
//! [`EngineContext`] carries the database and every collaborator. Each
//! service holds it behind an `Arc` so clones are cheap and can be moved
//! into handlers and background tasks.

use servicebook_db::{Database, DbBooking, PgTx};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::bookings::BookingService;
use crate::catalog::{PgServiceCatalog, ServiceCatalog};
use crate::config::EngineConfig;
use crate::disputes::DisputeEngine;
use crate::notify::{Notifier, SideEffects};
use crate::payments::{HttpGateway, PaymentGateway, PaymentOrchestrator};
use crate::reconciler::Reconciler;
use crate::resolver::SchemaResolver;
use crate::wallets::WalletService;
use crate::{CoreError, CoreResult};

pub struct EngineContext {
    pub db: Database,
    pub config: EngineConfig,
    pub resolver: SchemaResolver,
    pub notifier: Arc<dyn Notifier>,
    pub catalog: Arc<dyn ServiceCatalog>,
    pub gateway: Arc<dyn PaymentGateway>,
}

impl EngineContext {
    /// Commit, then deliver the side effects collected alongside
    pub(crate) async fn commit(&self, tx: PgTx, effects: SideEffects) -> CoreResult<()> {
        tx.commit().await?;
        let report = effects.dispatch(self.notifier.as_ref()).await;
        if report.failed > 0 {
            debug!(
                delivered = report.delivered,
                failed = report.failed,
                "Side effects partially delivered"
            );
        }
        Ok(())
    }

    /// Row-lock a booking or fail with not-found
    pub(crate) async fn lock_booking(&self, tx: &mut PgTx, booking_id: Uuid) -> CoreResult<DbBooking> {
        servicebook_db::BookingRepo::lock_by_id(&mut **tx, booking_id)
            .await?
            .ok_or_else(|| CoreError::not_found("booking", booking_id))
    }
}

/// All engine services over one shared context
#[derive(Clone)]
pub struct Engine {
    pub bookings: BookingService,
    pub payments: PaymentOrchestrator,
    pub disputes: DisputeEngine,
    pub wallets: WalletService,
    pub reconciler: Reconciler,
    context: Arc<EngineContext>,
}

impl Engine {
    pub fn new(context: EngineContext) -> Self {
        let context = Arc::new(context);
        Self {
            bookings: BookingService::new(context.clone()),
            payments: PaymentOrchestrator::new(context.clone()),
            disputes: DisputeEngine::new(context.clone()),
            wallets: WalletService::new(context.clone()),
            reconciler: Reconciler::new(context.clone()),
            context,
        }
    }

    /// Engine with the default collaborators: Postgres catalog and the HTTP
    /// payment gateway
    pub fn with_defaults(
        db: Database,
        config: EngineConfig,
        resolver: SchemaResolver,
        notifier: Arc<dyn Notifier>,
    ) -> CoreResult<Self> {
        let gateway = Arc::new(HttpGateway::new(&config.payments)?);
        let catalog = Arc::new(PgServiceCatalog::new(db.clone()));
        Ok(Self::new(EngineContext {
            db,
            config,
            resolver,
            notifier,
            catalog,
            gateway,
        }))
    }

    pub fn context(&self) -> &EngineContext {
        &self.context
    }

    pub fn db(&self) -> &Database {
        &self.context.db
    }

    pub fn config(&self) -> &EngineConfig {
        &self.context.config
    }
}

#[cfg(test)]
pub(crate) fn test_context() -> EngineContext {
    use crate::notify::TracingNotifier;
    use crate::resolver::IdentityMapping;

    let db = Database::lazy("postgresql://servicebook@127.0.0.1:1/servicebook")
        .expect("lazy pool");
    let config = EngineConfig::default();
    EngineContext {
        gateway: Arc::new(HttpGateway::new(&config.payments).expect("gateway")),
        catalog: Arc::new(PgServiceCatalog::new(db.clone())),
        notifier: Arc::new(TracingNotifier),
        resolver: SchemaResolver::new(IdentityMapping::Direct),
        config,
        db,
    }
}

//! Read-only service catalog collaborator

use async_trait::async_trait;
use rust_decimal::Decimal;
use servicebook_db::{Database, ServiceRepo};
use servicebook_types::PricingType;
use uuid::Uuid;

use crate::CoreResult;

/// What booking creation needs to know about a service
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceInfo {
    pub id: Uuid,
    /// Provider reference as stored on bookings
    pub provider_id: Uuid,
    pub price: Decimal,
    pub pricing_type: PricingType,
    pub duration_minutes: Option<i32>,
    pub is_active: bool,
}

#[async_trait]
pub trait ServiceCatalog: Send + Sync {
    async fn get_service(&self, service_id: Uuid) -> CoreResult<Option<ServiceInfo>>;
}

/// Catalog backed by the `services` table
#[derive(Clone)]
pub struct PgServiceCatalog {
    db: Database,
}

impl PgServiceCatalog {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ServiceCatalog for PgServiceCatalog {
    async fn get_service(&self, service_id: Uuid) -> CoreResult<Option<ServiceInfo>> {
        let mut conn = self.db.pg.acquire().await?;
        let service = ServiceRepo::find_by_id(&mut conn, service_id).await?;
        Ok(service.map(|s| ServiceInfo {
            id: s.id,
            provider_id: s.provider_id,
            price: s.price,
            pricing_type: s.pricing_type(),
            duration_minutes: s.duration_minutes,
            is_active: s.is_active,
        }))
    }
}

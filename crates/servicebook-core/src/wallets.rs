//! Provider wallet access

use rust_decimal::Decimal;
use serde::Deserialize;
use servicebook_db::DbWalletTransaction;
use servicebook_types::{Actor, BalanceKind, Role};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::bookings::Page;
use crate::engine::EngineContext;
use crate::ledger::{EscrowLedger, WalletSummary};
use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Deserialize)]
pub struct AdjustWallet {
    pub balance_kind: BalanceKind,
    /// Signed delta
    pub amount: Decimal,
    pub reason: String,
}

#[derive(Clone)]
pub struct WalletService {
    ctx: Arc<EngineContext>,
}

impl WalletService {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self { ctx }
    }

    /// The acting provider's balances
    pub async fn summary(&self, actor: Actor) -> CoreResult<WalletSummary> {
        actor.require(Role::Provider)?;
        let mut conn = self.ctx.db.pg.acquire().await?;
        EscrowLedger::summary(&mut conn, actor.user_id).await
    }

    pub async fn transactions(&self, actor: Actor, page: Page) -> CoreResult<Vec<DbWalletTransaction>> {
        actor.require(Role::Provider)?;
        let mut conn = self.ctx.db.pg.acquire().await?;
        EscrowLedger::history(&mut conn, actor.user_id, page.limit, page.offset).await
    }

    /// Admin correction of a provider balance
    #[instrument(skip(self, request), fields(user_id = %actor.user_id))]
    pub async fn adjust(
        &self,
        actor: Actor,
        provider_id: Uuid,
        request: AdjustWallet,
    ) -> CoreResult<DbWalletTransaction> {
        actor.require(Role::Admin)?;
        let reason = request.reason.trim();
        if reason.is_empty() {
            return Err(CoreError::validation("adjustment reason is required"));
        }

        let mut tx = self.ctx.db.begin().await?;
        let row = EscrowLedger::adjust(
            &mut *tx,
            provider_id,
            request.balance_kind,
            request.amount,
            reason,
            actor.user_id,
        )
        .await?;
        tx.commit().await?;
        Ok(row)
    }
}

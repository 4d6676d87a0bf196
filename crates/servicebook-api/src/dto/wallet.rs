//! Wallet DTOs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use servicebook_core::{AdjustWallet, WalletSummary};
use servicebook_db::DbWalletTransaction;
use servicebook_types::BalanceKind;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WalletResponse {
    /// Empty until the first ledger movement
    pub wallet_id: Option<Uuid>,
    pub provider_id: Uuid,
    #[schema(value_type = String, example = "850.00")]
    pub pending_balance: Decimal,
    #[schema(value_type = String, example = "0.00")]
    pub available_balance: Decimal,
}

impl From<WalletSummary> for WalletResponse {
    fn from(s: WalletSummary) -> Self {
        Self {
            wallet_id: s.wallet_id,
            provider_id: s.provider_id,
            pending_balance: s.balances.pending,
            available_balance: s.balances.available,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WalletTransactionResponse {
    pub id: Uuid,
    pub payment_id: Option<Uuid>,
    pub transaction_type: String,
    pub balance_kind: String,
    #[schema(value_type = String)]
    pub amount: Decimal,
    #[schema(value_type = String)]
    pub balance_after: Decimal,
    pub description: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<DbWalletTransaction> for WalletTransactionResponse {
    fn from(t: DbWalletTransaction) -> Self {
        Self {
            id: t.id,
            payment_id: t.payment_id,
            transaction_type: t.tx_type,
            balance_kind: t.balance_kind,
            amount: t.amount,
            balance_after: t.balance_after,
            description: t.description,
            created_by: t.created_by,
            created_at: t.created_at,
        }
    }
}

/// Admin correction of one balance
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct AdjustWalletRequest {
    #[schema(value_type = String, example = "available")]
    pub balance_kind: BalanceKind,
    /// Signed delta
    #[schema(value_type = String, example = "-25.00")]
    pub amount: Decimal,
    #[validate(length(min = 1, max = 500, message = "reason is required"))]
    pub reason: String,
}

impl From<AdjustWalletRequest> for AdjustWallet {
    fn from(req: AdjustWalletRequest) -> Self {
        Self {
            balance_kind: req.balance_kind,
            amount: req.amount,
            reason: req.reason,
        }
    }
}

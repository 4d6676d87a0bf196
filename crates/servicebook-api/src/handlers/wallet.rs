//! Wallet Handlers
//!
//! Provider balance views and admin corrections.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::dto::{AdjustWalletRequest, PageQuery, WalletResponse, WalletTransactionResponse};
use crate::error::ApiResult;
use crate::extractors::{AuthUser, RequireAdmin, ValidatedJson};
use crate::state::AppState;

/// The calling provider's balances
#[utoipa::path(
    get,
    path = "/api/v1/wallet",
    tag = "Wallet",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Balances", body = WalletResponse),
        (status = 403, description = "Provider role required")
    )
)]
pub async fn get_wallet(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
) -> ApiResult<Json<WalletResponse>> {
    let summary = state.engine.wallets.summary(actor).await?;
    Ok(Json(summary.into()))
}

#[utoipa::path(
    get,
    path = "/api/v1/wallet/transactions",
    tag = "Wallet",
    params(PageQuery),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Ledger rows, newest first", body = [WalletTransactionResponse])
    )
)]
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Vec<WalletTransactionResponse>>> {
    let rows = state.engine.wallets.transactions(actor, query.page()).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// Adjust one balance of a provider wallet (admin)
#[utoipa::path(
    post,
    path = "/api/v1/admin/wallets/{provider_id}/adjust",
    tag = "Wallet",
    params(("provider_id" = Uuid, Path, description = "Provider user id")),
    request_body = AdjustWalletRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Ledger row written", body = WalletTransactionResponse),
        (status = 422, description = "Balance would go negative")
    )
)]
pub async fn adjust_wallet(
    State(state): State<Arc<AppState>>,
    RequireAdmin(actor): RequireAdmin,
    Path(provider_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<AdjustWalletRequest>,
) -> ApiResult<Json<WalletTransactionResponse>> {
    let row = state.engine.wallets.adjust(actor, provider_id, request.into()).await?;
    Ok(Json(row.into()))
}

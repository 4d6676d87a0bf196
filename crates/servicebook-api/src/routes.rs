//! API Routes

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

use crate::handlers;
use crate::state::AppState;

/// Create API v1 routes
pub fn api_v1_routes() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/bookings", booking_routes())
        .nest("/payments", payment_routes())
        .nest("/wallet", wallet_routes())
        .route(
            "/admin/wallets/:provider_id/adjust",
            post(handlers::wallet::adjust_wallet),
        )
}

fn booking_routes() -> Router<Arc<AppState>> {
    use handlers::bookings::*;

    Router::new()
        .route("/", post(create_booking).get(list_bookings))
        .route("/disputed", get(list_disputed))
        .route(
            "/:id",
            get(get_booking).put(update_booking_status).delete(delete_booking),
        )
        .route("/:id/reschedule", put(reschedule_booking))
        .route("/:id/complete", post(complete_booking))
        .route("/:id/evidence", get(list_evidence))
        .route("/:id/confirm", put(confirm_booking))
        .route("/:id/resolve-dispute", put(resolve_dispute))
        .route("/:id/dispute-audit", get(dispute_audit))
}

fn payment_routes() -> Router<Arc<AppState>> {
    use handlers::payments::*;

    Router::new()
        .route("/create-intent", post(create_intent))
        .route("/attach-method", post(attach_method))
        .route("/confirm", post(confirm_payment))
        .route("/webhook", post(webhook))
        .route("/:id", get(get_payment))
}

fn wallet_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(handlers::wallet::get_wallet))
        .route("/transactions", get(handlers::wallet::list_transactions))
}

/// Create Swagger UI routes
pub fn swagger_routes() -> Router<Arc<AppState>> {
    use crate::openapi::ApiDoc;
    use utoipa::OpenApi;
    use utoipa_swagger_ui::SwaggerUi;

    Router::new().merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

//! Combines the API routes from all modules into a unified router.
//!
//! Everything except the auth endpoints and the health probe sits behind the
//! session gate.

use axum::{middleware, routing::get, Json, Router};
use std::sync::Arc;

use crate::shared::state::AppState;

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

pub fn configure_api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let protected = Router::new()
        .merge(crate::auth::configure_session_routes())
        .merge(crate::accounts::configure_accounts_routes())
        .merge(crate::cards::configure_cards_routes())
        .merge(crate::transactions::configure_transactions_routes())
        .merge(crate::payments::configure_payments_routes())
        .merge(crate::budgets::configure_budgets_routes())
        .merge(crate::invoicing::configure_invoicing_routes())
        .merge(crate::portfolio::configure_portfolio_routes())
        .merge(crate::reports::configure_reports_routes())
        .merge(crate::tickets::configure_tickets_routes())
        .layer(middleware::from_fn_with_state(
            state,
            crate::auth::require_session,
        ));

    Router::new()
        .route("/health", get(health_check))
        .merge(crate::auth::configure_auth_routes())
        .merge(protected)
}

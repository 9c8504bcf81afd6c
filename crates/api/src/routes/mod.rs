//! HTTP routes

pub mod admin;
pub mod payments;

use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::json;

use crate::state::AppState;

/// Build the application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/payments/create", post(payments::create_payment))
        .route("/payments/webhook", post(payments::webhook))
        .route("/payments/{id}/status", get(payments::payment_status))
        .route("/payments/{id}/cancel", delete(payments::cancel_payment))
        .route(
            "/payments/cancel-subscription",
            post(payments::cancel_subscription),
        )
        .route(
            "/admin/accounts/{id}/activate",
            post(admin::activate_account),
        )
        .route("/admin/invariants", get(admin::run_invariant_checks))
        .route("/admin/invariants/{name}", get(admin::run_invariant_check))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

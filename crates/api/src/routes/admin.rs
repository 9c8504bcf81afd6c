//! Administrative routes
//!
//! Protected by a role check on the authenticated account (admin, superadmin).

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use carrierport_billing::{
    ActivationOutcome, InvariantCheckSummary, InvariantChecker, InvariantViolation,
};
use carrierport_shared::SubscriptionPlan;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, sqlx::FromRow)]
struct RoleRow {
    role: String,
}

/// Check that the authenticated account holds an administrative role
async fn require_admin(state: &AppState, auth_user: &AuthUser) -> ApiResult<Uuid> {
    let row: Option<RoleRow> = sqlx::query_as("SELECT role FROM accounts WHERE id = $1")
        .bind(auth_user.account_id)
        .fetch_optional(&state.pool)
        .await?;

    let role = row.map(|r| r.role).unwrap_or_else(|| "user".to_string());

    match role.as_str() {
        "superadmin" | "admin" => Ok(auth_user.account_id),
        _ => {
            tracing::warn!(
                account_id = %auth_user.account_id,
                role = %role,
                "Unauthorized admin access attempt"
            );
            Err(ApiError::Forbidden)
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ActivateAccountRequest {
    pub plan: SubscriptionPlan,
    pub duration_days: i64,
}

/// `POST /admin/accounts/{id}/activate`
///
/// Grant a subscription without a payment record. Takes the identical fan-out
/// path as a paid webhook.
pub async fn activate_account(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(account_id): Path<Uuid>,
    Json(request): Json<ActivateAccountRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let admin_id = require_admin(&state, &auth_user).await?;

    if !(1..=730).contains(&request.duration_days) {
        return Err(ApiError::BadRequest(
            "duration_days must be between 1 and 730".to_string(),
        ));
    }

    let outcome = state
        .billing
        .activation
        .activate_account(account_id, request.plan, request.duration_days)
        .await?;

    let ActivationOutcome::Activated {
        plan,
        expires_at,
        profiles_updated,
    } = outcome
    else {
        return Err(ApiError::Billing(
            carrierport_billing::BillingError::InvalidState(
                "administrative activation did not activate".to_string(),
            ),
        ));
    };

    tracing::info!(
        admin_id = %admin_id,
        account_id = %account_id,
        plan = %plan,
        "Administrative subscription activation via API"
    );

    Ok(Json(json!({
        "account_id": account_id,
        "plan": plan,
        "expires_at": expires_at.to_string(),
        "profiles_updated": profiles_updated,
    })))
}

/// `GET /admin/invariants`
pub async fn run_invariant_checks(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> ApiResult<Json<InvariantCheckSummary>> {
    require_admin(&state, &auth_user).await?;
    let summary = state.billing.invariants.run_all_checks().await?;
    Ok(Json(summary))
}

/// `GET /admin/invariants/{name}`
pub async fn run_invariant_check(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(name): Path<String>,
) -> ApiResult<Json<Vec<InvariantViolation>>> {
    require_admin(&state, &auth_user).await?;

    if !InvariantChecker::available_checks().contains(&name.as_str()) {
        return Err(ApiError::BadRequest(format!(
            "unknown invariant check '{}'",
            name
        )));
    }

    let violations = state.billing.invariants.run_check(&name).await?;
    Ok(Json(violations))
}

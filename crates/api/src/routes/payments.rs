//! Payment routes
//!
//! The webhook endpoint is deliberately asymmetric in its error handling:
//! a missing external id is a 400, an unknown record is a 404 (fail closed,
//! never create records here), and a failed authoritative status fetch is a
//! 502 so the provider redelivers. Only once the re-fetch has succeeded and
//! the state update has been attempted do internal failures answer 200, so
//! the provider does not enter a retry storm for a fault on our side.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use carrierport_billing::{ActivationOutcome, BillingError, CreatedPayment, PaymentView};
use carrierport_shared::{BillingPeriod, SubscriptionPlan};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub plan: SubscriptionPlan,
    pub billing_period: BillingPeriod,
}

/// `POST /payments/create`
pub async fn create_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreatePaymentRequest>,
) -> ApiResult<Json<CreatedPayment>> {
    let created = state
        .billing
        .payments
        .create_payment(user.account_id, request.plan, request.billing_period)
        .await?;
    Ok(Json(created))
}

/// `GET /payments/{id}/status`
pub async fn payment_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(payment_id): Path<Uuid>,
) -> ApiResult<Json<PaymentView>> {
    let view = state
        .billing
        .payments
        .get_payment(payment_id, user.account_id)
        .await?;
    Ok(Json(view))
}

/// `DELETE /payments/{id}/cancel`
pub async fn cancel_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(payment_id): Path<Uuid>,
) -> ApiResult<Json<PaymentView>> {
    let view = state
        .billing
        .payments
        .cancel_payment(payment_id, user.account_id)
        .await?;
    Ok(Json(view))
}

#[derive(Debug, Serialize)]
pub struct CancelSubscriptionResponse {
    pub plan: SubscriptionPlan,
    pub profiles_updated: u64,
}

/// `POST /payments/cancel-subscription`
pub async fn cancel_subscription(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<CancelSubscriptionResponse>> {
    let result = state
        .billing
        .activation
        .cancel_subscription(user.account_id)
        .await?;
    Ok(Json(CancelSubscriptionResponse {
        plan: SubscriptionPlan::None,
        profiles_updated: result.profiles_updated,
    }))
}

/// Provider notification body; the provider posts form-urlencoded with the
/// external charge id as the only guaranteed field
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub id: Option<String>,
}

/// `POST /payments/webhook` (unauthenticated, provider-only)
pub async fn webhook(
    State(state): State<AppState>,
    Form(payload): Form<WebhookPayload>,
) -> Result<Response, ApiError> {
    let Some(external_id) = payload.id.filter(|id| !id.is_empty()) else {
        return Err(ApiError::BadRequest(
            "notification is missing the charge id".to_string(),
        ));
    };

    match state
        .billing
        .webhooks
        .handle_notification(&external_id)
        .await
    {
        Ok(outcome) => {
            let label = match outcome {
                ActivationOutcome::Activated { .. } => "activated",
                ActivationOutcome::Closed(_) => "closed",
                ActivationOutcome::AlreadyProcessed(_) => "duplicate",
                ActivationOutcome::NoChange(_) => "no_change",
            };
            Ok((StatusCode::OK, Json(json!({ "received": true, "outcome": label })))
                .into_response())
        }
        Err(e) => webhook_failure_response(&external_id, e),
    }
}

/// Map a failed notification onto the acknowledgement policy
///
/// Unknown records fail closed (404, no PaymentRecord is ever created here).
/// A failed authoritative fetch means no state change was attempted, so it is
/// surfaced (502) and the provider redelivers. Everything past a successful
/// re-fetch is acknowledged with 200: the update was attempted, and a retry
/// storm would not help a fault on our side.
fn webhook_failure_response(
    external_id: &str,
    error: BillingError,
) -> Result<Response, ApiError> {
    match error {
        e @ (BillingError::NotFound(_) | BillingError::Upstream(_)) => Err(ApiError::Billing(e)),
        e => {
            tracing::error!(
                external_id = %external_id,
                error = %e,
                "Webhook processing failed after authoritative fetch; acknowledging delivery"
            );
            Ok((StatusCode::OK, Json(json!({ "received": true, "outcome": "error" })))
                .into_response())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_authoritative_fetch_is_surfaced_for_redelivery() {
        let result =
            webhook_failure_response("ch_x", BillingError::Upstream("gateway timeout".into()));
        let response = result.unwrap_err().into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_unknown_record_fails_closed() {
        let result = webhook_failure_response(
            "ch_x",
            BillingError::NotFound("no payment record for external id ch_x".into()),
        );
        let response = result.unwrap_err().into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_internal_failure_after_fetch_is_acknowledged() {
        let result = webhook_failure_response(
            "ch_x",
            BillingError::InvalidState("unknown payment status 'weird'".into()),
        );
        let response = result.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

//! Provider webhook handling
//!
//! The provider notifies asynchronously, at least once, possibly duplicated
//! and out of order. The notification body carries only the external charge
//! id; the authoritative status is always re-fetched from the gateway before
//! any state change.

use sqlx::PgPool;
use uuid::Uuid;

use crate::activation::{ActivationOutcome, ActivationService};
use crate::error::{BillingError, BillingResult};
use crate::gateway::GatewayClient;

/// Handler for asynchronous provider notifications
#[derive(Clone)]
pub struct WebhookHandler {
    gateway: GatewayClient,
    pool: PgPool,
    activation: ActivationService,
}

impl WebhookHandler {
    pub fn new(gateway: GatewayClient, pool: PgPool) -> Self {
        let activation = ActivationService::new(pool.clone());
        Self {
            gateway,
            pool,
            activation,
        }
    }

    /// Process one provider notification
    ///
    /// Unknown external ids are rejected: payment records are only created by
    /// the purchase-initiation path, never here. Holds no lock of its own;
    /// duplicate and racing deliveries are serialized by the activation
    /// service's guard.
    pub async fn handle_notification(
        &self,
        external_id: &str,
    ) -> BillingResult<ActivationOutcome> {
        let payment_id: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM payment_records WHERE external_id = $1")
                .bind(external_id)
                .fetch_optional(&self.pool)
                .await?;

        let Some(payment_id) = payment_id else {
            self.record_delivery(external_id, "unknown_record", None).await;
            return Err(BillingError::NotFound(format!(
                "no payment record for external id {}",
                external_id
            )));
        };

        let remote = match self.gateway.fetch_status(external_id).await {
            Ok(remote) => remote,
            Err(e) => {
                self.record_delivery(external_id, "fetch_failed", Some(&e.to_string()))
                    .await;
                return Err(e);
            }
        };

        tracing::info!(
            external_id = %external_id,
            payment_id = %payment_id,
            reported = %remote.status,
            "Processing provider notification with authoritative status"
        );

        let result = self
            .activation
            .apply_gateway_status(payment_id, &remote.status)
            .await;

        match &result {
            Ok(outcome) => {
                self.record_delivery(external_id, outcome_label(outcome), None)
                    .await;
            }
            Err(e) => {
                self.record_delivery(external_id, "error", Some(&e.to_string()))
                    .await;
            }
        }

        result
    }

    /// Append to the delivery audit trail
    ///
    /// Best-effort: an audit failure never fails the delivery itself.
    async fn record_delivery(&self, external_id: &str, outcome: &str, detail: Option<&str>) {
        let result = sqlx::query(
            "INSERT INTO webhook_deliveries (external_id, outcome, detail) VALUES ($1, $2, $3)",
        )
        .bind(external_id)
        .bind(outcome)
        .bind(detail)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            tracing::warn!(
                external_id = %external_id,
                outcome = %outcome,
                error = %e,
                "Failed to record webhook delivery audit entry"
            );
        }
    }
}

fn outcome_label(outcome: &ActivationOutcome) -> &'static str {
    match outcome {
        ActivationOutcome::Activated { .. } => "activated",
        ActivationOutcome::Closed(_) => "closed",
        ActivationOutcome::AlreadyProcessed(_) => "duplicate",
        ActivationOutcome::NoChange(_) => "no_change",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carrierport_shared::{PaymentStatus, SubscriptionPlan};
    use time::OffsetDateTime;

    #[test]
    fn test_outcome_labels() {
        assert_eq!(
            outcome_label(&ActivationOutcome::Activated {
                plan: SubscriptionPlan::Premium,
                expires_at: OffsetDateTime::now_utc(),
                profiles_updated: 2,
            }),
            "activated"
        );
        assert_eq!(
            outcome_label(&ActivationOutcome::Closed(PaymentStatus::Failed)),
            "closed"
        );
        assert_eq!(
            outcome_label(&ActivationOutcome::AlreadyProcessed(PaymentStatus::Paid)),
            "duplicate"
        );
        assert_eq!(
            outcome_label(&ActivationOutcome::NoChange(PaymentStatus::Pending)),
            "no_change"
        );
    }
}

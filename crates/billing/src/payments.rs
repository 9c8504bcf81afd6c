//! Payment record management
//!
//! The purchase-initiation path: create the remote charge first, insert the
//! local record only once the provider has confirmed creation, then patch the
//! redirect URL (which embeds the local payment id) onto the charge.

use serde::Serialize;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use carrierport_shared::{price_cents, BillingPeriod, PaymentStatus, SubscriptionPlan, CURRENCY};

use crate::error::{BillingError, BillingResult};
use crate::gateway::GatewayClient;

/// Response to a purchase initiation
#[derive(Debug, Clone, Serialize)]
pub struct CreatedPayment {
    pub payment_id: Uuid,
    pub checkout_url: Option<String>,
    pub redirect_url: String,
    pub status: PaymentStatus,
}

/// Owner-scoped view of a payment record
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PaymentView {
    pub id: Uuid,
    pub external_id: String,
    pub plan_requested: String,
    pub amount_cents: i64,
    pub currency: String,
    pub status: String,
    pub billing_period: String,
    pub duration_days: i32,
    pub checkout_url: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub paid_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Service managing payment records and their remote charges
#[derive(Clone)]
pub struct PaymentService {
    gateway: GatewayClient,
    pool: PgPool,
}

impl PaymentService {
    pub fn new(gateway: GatewayClient, pool: PgPool) -> Self {
        Self { gateway, pool }
    }

    /// Initiate a plan purchase
    ///
    /// The gateway call happens before any local write: if charge creation
    /// fails, the purchase aborts with no partially-created record. The
    /// redirect patch is best-effort, since the customer can still complete
    /// checkout through the returned URL without it.
    pub async fn create_payment(
        &self,
        account_id: Uuid,
        plan: SubscriptionPlan,
        period: BillingPeriod,
    ) -> BillingResult<CreatedPayment> {
        let amount_cents = price_cents(plan, period).ok_or_else(|| {
            BillingError::InvalidState("the free plan cannot be purchased".to_string())
        })?;

        let account_exists: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM accounts WHERE id = $1")
                .bind(account_id)
                .fetch_optional(&self.pool)
                .await?;
        if account_exists.is_none() {
            return Err(BillingError::NotFound(format!("account {}", account_id)));
        }

        let description = format!("Carrierport {} plan ({})", plan, period);
        let metadata = serde_json::json!({
            "account_id": account_id,
            "plan": plan.as_str(),
            "billing_period": period.as_str(),
        });

        let charge = self
            .gateway
            .create_charge(amount_cents, CURRENCY, &description, metadata)
            .await?;

        let payment_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO payment_records
                (id, external_id, account_id, plan_requested, amount_cents, currency,
                 status, billing_period, duration_days, checkout_url)
            VALUES ($1, $2, $3, $4, $5, $6, 'pending', $7, $8, $9)
            "#,
        )
        .bind(payment_id)
        .bind(&charge.external_id)
        .bind(account_id)
        .bind(plan.as_str())
        .bind(amount_cents)
        .bind(CURRENCY)
        .bind(period.as_str())
        .bind(period.duration_days() as i32)
        .bind(&charge.checkout_url)
        .execute(&self.pool)
        .await?;

        // The redirect embeds the local id, which only exists now.
        let redirect_url = format!(
            "{}/payments/{}/return",
            self.gateway.config().redirect_base_url,
            payment_id
        );
        if let Err(e) = self
            .gateway
            .update_redirect(&charge.external_id, &redirect_url)
            .await
        {
            tracing::warn!(
                payment_id = %payment_id,
                external_id = %charge.external_id,
                error = %e,
                "Failed to patch redirect URL onto charge; checkout still usable"
            );
        }

        tracing::info!(
            payment_id = %payment_id,
            external_id = %charge.external_id,
            account_id = %account_id,
            plan = %plan,
            billing_period = %period,
            amount_cents = amount_cents,
            "Created payment record"
        );

        Ok(CreatedPayment {
            payment_id,
            checkout_url: charge.checkout_url,
            redirect_url,
            status: PaymentStatus::Pending,
        })
    }

    /// Fetch a payment record, scoped to its owning account
    pub async fn get_payment(
        &self,
        payment_id: Uuid,
        account_id: Uuid,
    ) -> BillingResult<PaymentView> {
        sqlx::query_as(
            r#"
            SELECT id, external_id, plan_requested, amount_cents, currency, status,
                   billing_period, duration_days, checkout_url, paid_at, created_at
            FROM payment_records
            WHERE id = $1 AND account_id = $2
            "#,
        )
        .bind(payment_id)
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| BillingError::NotFound(format!("payment record {}", payment_id)))
    }

    /// Cancel a pending payment record
    ///
    /// Only `pending` records can be canceled. The remote cancel is
    /// best-effort; the local record transitions to `canceled` even when the
    /// provider call fails or times out (authoritative local).
    pub async fn cancel_payment(
        &self,
        payment_id: Uuid,
        account_id: Uuid,
    ) -> BillingResult<PaymentView> {
        let mut tx = self.pool.begin().await?;

        let row: Option<(String, String)> = sqlx::query_as(
            r#"
            SELECT external_id, status FROM payment_records
            WHERE id = $1 AND account_id = $2
            FOR UPDATE
            "#,
        )
        .bind(payment_id)
        .bind(account_id)
        .fetch_optional(&mut *tx)
        .await?;

        let (external_id, status_str) = row
            .ok_or_else(|| BillingError::NotFound(format!("payment record {}", payment_id)))?;
        let status: PaymentStatus = status_str
            .parse()
            .map_err(|e: String| BillingError::InvalidState(e))?;

        if status != PaymentStatus::Pending {
            return Err(BillingError::InvalidState(format!(
                "cannot cancel a {} payment",
                status
            )));
        }

        sqlx::query("UPDATE payment_records SET status = 'canceled' WHERE id = $1")
            .bind(payment_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(
            payment_id = %payment_id,
            from_status = %status,
            to_status = %PaymentStatus::Canceled,
            "Canceled pending payment record"
        );

        if let Err(e) = self.gateway.cancel_charge(&external_id).await {
            tracing::warn!(
                payment_id = %payment_id,
                external_id = %external_id,
                error = %e,
                "Remote charge cancellation failed; local record already canceled"
            );
        }

        self.get_payment(payment_id, account_id).await
    }
}

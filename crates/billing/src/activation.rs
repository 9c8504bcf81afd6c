//! Subscription activation service
//!
//! The only place that decides what a payment means for account state. Every
//! code path that changes an account's plan (webhook, user cancellation,
//! administrative activation) goes through the single projection routine
//! here, so the account and its carrier profiles can never diverge by code
//! path.
//!
//! Webhooks are delivered at least once and may race with a user-driven
//! cancellation; the row lock plus terminal-status guard in
//! [`ActivationService::apply_gateway_status`] is the only defense, so the
//! guard is deliberate, not incidental.

use sqlx::PgPool;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use carrierport_shared::{PaymentStatus, PlanProjection, SubscriptionPlan};

use crate::error::{BillingError, BillingResult};
use crate::gateway::ChargeStatus;

/// Decision taken for one gateway status report against one payment record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// `pending -> paid`: activate the subscription and fan out
    Activate,
    /// `pending -> failed/canceled/expired`: update the record only
    Close(PaymentStatus),
    /// Record is already terminal; duplicates and stale reports never regress it
    AlreadyTerminal,
    /// Gateway still reports the charge open, or reported an unrecognized status
    NoChange,
}

/// Pure transition function for the payment state machine
///
/// Terminal records absorb every report, including a repeated `paid`: that is
/// what makes webhook processing idempotent (no double-extended expiry, no
/// duplicate fan-out).
pub fn decide(current: PaymentStatus, reported: &ChargeStatus) -> Transition {
    if current.is_terminal() {
        return Transition::AlreadyTerminal;
    }
    match reported {
        ChargeStatus::Paid => Transition::Activate,
        ChargeStatus::Failed => Transition::Close(PaymentStatus::Failed),
        ChargeStatus::Canceled => Transition::Close(PaymentStatus::Canceled),
        ChargeStatus::Expired => Transition::Close(PaymentStatus::Expired),
        ChargeStatus::Pending | ChargeStatus::Unknown(_) => Transition::NoChange,
    }
}

/// Result of applying a gateway status report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationOutcome {
    /// Subscription activated and projected onto every owned carrier profile
    Activated {
        plan: SubscriptionPlan,
        expires_at: OffsetDateTime,
        profiles_updated: u64,
    },
    /// Record closed without account mutation
    Closed(PaymentStatus),
    /// Duplicate or stale report against a terminal record; nothing changed
    AlreadyProcessed(PaymentStatus),
    /// Charge still open at the provider; nothing changed
    NoChange(PaymentStatus),
}

/// Result of a user-initiated subscription cancellation
#[derive(Debug, Clone, Copy)]
pub struct CancellationResult {
    pub profiles_updated: u64,
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    account_id: Uuid,
    status: String,
    plan_requested: String,
    duration_days: i32,
}

/// Service applying subscription state transitions
#[derive(Clone)]
pub struct ActivationService {
    pool: PgPool,
}

impl ActivationService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply an authoritative gateway status to a payment record
    ///
    /// On `paid`, exactly once: stamp `paid_at`, compute the expiry from the
    /// record's `duration_days`, update the account triple, and fan the same
    /// triple out to every owned carrier profile. The whole transition runs
    /// in one transaction with the record row locked, so concurrent
    /// deliveries for the same record serialize and the loser sees a
    /// terminal status.
    pub async fn apply_gateway_status(
        &self,
        payment_id: Uuid,
        reported: &ChargeStatus,
    ) -> BillingResult<ActivationOutcome> {
        let mut tx = self.pool.begin().await?;

        let row: PaymentRow = sqlx::query_as(
            r#"
            SELECT account_id, status, plan_requested, duration_days
            FROM payment_records
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(payment_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| BillingError::NotFound(format!("payment record {}", payment_id)))?;

        let current: PaymentStatus = row
            .status
            .parse()
            .map_err(|e: String| BillingError::InvalidState(e))?;

        match decide(current, reported) {
            Transition::AlreadyTerminal => {
                tracing::info!(
                    payment_id = %payment_id,
                    status = %current,
                    reported = %reported,
                    "Ignoring gateway report for terminal payment record"
                );
                Ok(ActivationOutcome::AlreadyProcessed(current))
            }
            Transition::NoChange => {
                tracing::debug!(
                    payment_id = %payment_id,
                    reported = %reported,
                    "Gateway report caused no transition"
                );
                Ok(ActivationOutcome::NoChange(current))
            }
            Transition::Close(next) => {
                sqlx::query("UPDATE payment_records SET status = $1 WHERE id = $2")
                    .bind(next.as_str())
                    .bind(payment_id)
                    .execute(&mut *tx)
                    .await?;
                tx.commit().await?;

                tracing::info!(
                    payment_id = %payment_id,
                    from_status = %current,
                    to_status = %next,
                    "Closed payment record without account mutation"
                );
                Ok(ActivationOutcome::Closed(next))
            }
            Transition::Activate => {
                let plan: SubscriptionPlan = row
                    .plan_requested
                    .parse()
                    .map_err(|e: String| BillingError::InvalidState(e))?;
                let now = OffsetDateTime::now_utc();
                let expires_at = now + Duration::days(i64::from(row.duration_days));

                sqlx::query(
                    "UPDATE payment_records SET status = 'paid', paid_at = $1 WHERE id = $2",
                )
                .bind(now)
                .bind(payment_id)
                .execute(&mut *tx)
                .await?;

                let projection = PlanProjection::active(plan, expires_at);
                let profiles_updated = self
                    .apply_projection(&mut tx, row.account_id, projection)
                    .await?;

                tx.commit().await?;

                tracing::info!(
                    payment_id = %payment_id,
                    account_id = %row.account_id,
                    from_status = %current,
                    to_status = %PaymentStatus::Paid,
                    plan = %plan,
                    expires_at = %expires_at,
                    profiles_updated = profiles_updated,
                    "Activated subscription"
                );

                Ok(ActivationOutcome::Activated {
                    plan,
                    expires_at,
                    profiles_updated,
                })
            }
        }
    }

    /// Cancel an active subscription (user-initiated, separate from gateway
    /// cancellation)
    ///
    /// Immediately resets the account to `{none, false, null}` and fans the
    /// same reset out to every owned carrier profile.
    pub async fn cancel_subscription(
        &self,
        account_id: Uuid,
    ) -> BillingResult<CancellationResult> {
        let mut tx = self.pool.begin().await?;

        let plan_str: String =
            sqlx::query_scalar("SELECT plan FROM accounts WHERE id = $1 FOR UPDATE")
                .bind(account_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| BillingError::NotFound(format!("account {}", account_id)))?;

        let plan: SubscriptionPlan = plan_str
            .parse()
            .map_err(|e: String| BillingError::InvalidState(e))?;
        if !plan.is_paid() {
            return Err(BillingError::NotSubscribed);
        }

        let profiles_updated = self
            .apply_projection(&mut tx, account_id, PlanProjection::cleared())
            .await?;
        tx.commit().await?;

        tracing::info!(
            account_id = %account_id,
            from_plan = %plan,
            to_plan = %SubscriptionPlan::None,
            profiles_updated = profiles_updated,
            "Canceled subscription"
        );

        Ok(CancellationResult { profiles_updated })
    }

    /// Administrative activation without a payment record
    ///
    /// Follows the identical fan-out rule as the webhook path.
    pub async fn activate_account(
        &self,
        account_id: Uuid,
        plan: SubscriptionPlan,
        duration_days: i64,
    ) -> BillingResult<ActivationOutcome> {
        if !plan.is_paid() {
            return Err(BillingError::InvalidState(
                "cannot activate the free plan".to_string(),
            ));
        }

        let expires_at = OffsetDateTime::now_utc() + Duration::days(duration_days);
        let mut tx = self.pool.begin().await?;
        let profiles_updated = self
            .apply_projection(&mut tx, account_id, PlanProjection::active(plan, expires_at))
            .await?;
        tx.commit().await?;

        tracing::info!(
            account_id = %account_id,
            plan = %plan,
            expires_at = %expires_at,
            profiles_updated = profiles_updated,
            "Administrative subscription activation"
        );

        Ok(ActivationOutcome::Activated {
            plan,
            expires_at,
            profiles_updated,
        })
    }

    /// The single fan-out routine
    ///
    /// Writes the triple to the account, then projects the identical triple
    /// onto every carrier profile owned by it. The set-based UPDATE makes the
    /// fan-out atomic within the surrounding transaction; zero owned profiles
    /// is a valid no-op, not an error. Returns the number of profiles
    /// updated.
    async fn apply_projection(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        account_id: Uuid,
        projection: PlanProjection,
    ) -> BillingResult<u64> {
        let account_rows = sqlx::query(
            r#"
            UPDATE accounts
            SET plan = $1, is_premium = $2, premium_expires_at = $3, updated_at = NOW()
            WHERE id = $4
            "#,
        )
        .bind(projection.plan.as_str())
        .bind(projection.is_premium)
        .bind(projection.expires_at)
        .bind(account_id)
        .execute(&mut **tx)
        .await?
        .rows_affected();

        if account_rows == 0 {
            return Err(BillingError::NotFound(format!("account {}", account_id)));
        }

        let profile_rows = sqlx::query(
            r#"
            UPDATE carrier_profiles
            SET plan = $1, is_premium = $2, premium_expires_at = $3, updated_at = NOW()
            WHERE owner_id = $4
            "#,
        )
        .bind(projection.plan.as_str())
        .bind(projection.is_premium)
        .bind(projection.expires_at)
        .bind(account_id)
        .execute(&mut **tx)
        .await?
        .rows_affected();

        tracing::info!(
            account_id = %account_id,
            plan = %projection.plan,
            is_premium = projection.is_premium,
            profiles_updated = profile_rows,
            "Projected plan onto carrier profiles"
        );

        Ok(profile_rows)
    }
}

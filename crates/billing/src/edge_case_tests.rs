// Test file - these are expected patterns in test code
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

//! Edge Case Tests for the Subscription Core
//!
//! Tests critical boundary conditions in:
//! - The payment transition table (duplicates, regressions, unknown statuses)
//! - Activation expiry arithmetic
//! - Fan-out projections
//! - Purchase and cancellation guards

#[cfg(test)]
mod transition_tests {
    use crate::activation::{decide, Transition};
    use crate::gateway::ChargeStatus;
    use carrierport_shared::PaymentStatus;

    // =========================================================================
    // pending + paid -> activate
    // =========================================================================
    #[test]
    fn test_pending_paid_activates() {
        assert_eq!(
            decide(PaymentStatus::Pending, &ChargeStatus::Paid),
            Transition::Activate
        );
    }

    // =========================================================================
    // pending + failed/canceled/expired -> close, no account mutation
    // =========================================================================
    #[test]
    fn test_pending_closes_to_reported_terminal() {
        assert_eq!(
            decide(PaymentStatus::Pending, &ChargeStatus::Failed),
            Transition::Close(PaymentStatus::Failed)
        );
        assert_eq!(
            decide(PaymentStatus::Pending, &ChargeStatus::Canceled),
            Transition::Close(PaymentStatus::Canceled)
        );
        assert_eq!(
            decide(PaymentStatus::Pending, &ChargeStatus::Expired),
            Transition::Close(PaymentStatus::Expired)
        );
    }

    // =========================================================================
    // Idempotence: a second paid report for a paid record is absorbed
    // =========================================================================
    #[test]
    fn test_duplicate_paid_is_absorbed() {
        assert_eq!(
            decide(PaymentStatus::Paid, &ChargeStatus::Paid),
            Transition::AlreadyTerminal
        );
    }

    // =========================================================================
    // A stale gateway report must never regress a terminal record
    // =========================================================================
    #[test]
    fn test_terminal_records_never_regress() {
        let terminals = [
            PaymentStatus::Paid,
            PaymentStatus::Failed,
            PaymentStatus::Canceled,
            PaymentStatus::Expired,
        ];
        let reports = [
            ChargeStatus::Pending,
            ChargeStatus::Paid,
            ChargeStatus::Failed,
            ChargeStatus::Canceled,
            ChargeStatus::Expired,
            ChargeStatus::Unknown("refunded".to_string()),
        ];

        for current in terminals {
            for reported in &reports {
                assert_eq!(
                    decide(current, reported),
                    Transition::AlreadyTerminal,
                    "terminal {} must absorb report {}",
                    current,
                    reported
                );
            }
        }
    }

    // =========================================================================
    // Still-open and unrecognized statuses cause no transition
    // =========================================================================
    #[test]
    fn test_open_and_unknown_reports_are_no_ops() {
        assert_eq!(
            decide(PaymentStatus::Pending, &ChargeStatus::Pending),
            Transition::NoChange
        );
        assert_eq!(
            decide(
                PaymentStatus::Pending,
                &ChargeStatus::Unknown("chargeback".to_string())
            ),
            Transition::NoChange
        );
    }
}

#[cfg(test)]
mod expiry_tests {
    use carrierport_shared::BillingPeriod;
    use time::{Duration, OffsetDateTime};

    // =========================================================================
    // Monthly purchase grants 30 days, yearly 365, from activation time
    // =========================================================================
    #[test]
    fn test_expiry_is_activation_time_plus_duration() {
        let now = OffsetDateTime::now_utc();

        let monthly_expiry = now + Duration::days(BillingPeriod::Monthly.duration_days());
        assert_eq!(monthly_expiry - now, Duration::days(30));

        let yearly_expiry = now + Duration::days(BillingPeriod::Yearly.duration_days());
        assert_eq!(yearly_expiry - now, Duration::days(365));
    }

    // =========================================================================
    // Processing the same paid report twice yields the same expiry: the
    // second report never reaches the expiry computation (transition table),
    // so the first expiry stands
    // =========================================================================
    #[test]
    fn test_duplicate_report_cannot_extend_expiry() {
        use crate::activation::{decide, Transition};
        use crate::gateway::ChargeStatus;
        use carrierport_shared::PaymentStatus;

        let first = decide(PaymentStatus::Pending, &ChargeStatus::Paid);
        assert_eq!(first, Transition::Activate);

        // After the first activation the record is paid; the replay is absorbed
        let replay = decide(PaymentStatus::Paid, &ChargeStatus::Paid);
        assert_eq!(replay, Transition::AlreadyTerminal);
    }
}

#[cfg(test)]
mod projection_tests {
    use carrierport_shared::{PlanProjection, SubscriptionPlan};
    use time::{Duration, OffsetDateTime};

    // =========================================================================
    // Cancellation resets to {none, false, null}
    // =========================================================================
    #[test]
    fn test_cancellation_projection_resets_everything() {
        let cleared = PlanProjection::cleared();
        assert_eq!(cleared.plan, SubscriptionPlan::None);
        assert!(!cleared.is_premium);
        assert_eq!(cleared.expires_at, None);
    }

    // =========================================================================
    // is_premium is derived, never set independently
    // =========================================================================
    #[test]
    fn test_flag_always_matches_plan() {
        let expiry = OffsetDateTime::now_utc() + Duration::days(365);
        for plan in [SubscriptionPlan::Premium, SubscriptionPlan::Business] {
            let p = PlanProjection::active(plan, expiry);
            assert_eq!(p.is_premium, p.plan.is_paid());
        }
        let cleared = PlanProjection::cleared();
        assert_eq!(cleared.is_premium, cleared.plan.is_paid());
    }
}

#[cfg(test)]
mod purchase_guard_tests {
    use carrierport_shared::{price_cents, BillingPeriod, PaymentStatus, SubscriptionPlan};

    // =========================================================================
    // The free plan has no price and cannot be purchased
    // =========================================================================
    #[test]
    fn test_free_plan_has_no_price() {
        assert!(price_cents(SubscriptionPlan::None, BillingPeriod::Monthly).is_none());
        assert!(price_cents(SubscriptionPlan::None, BillingPeriod::Yearly).is_none());
    }

    // =========================================================================
    // Only pending records are cancelable by the user
    // =========================================================================
    #[test]
    fn test_only_pending_is_cancelable() {
        let cancelable = |s: PaymentStatus| s == PaymentStatus::Pending;

        assert!(cancelable(PaymentStatus::Pending));
        assert!(!cancelable(PaymentStatus::Paid));
        assert!(!cancelable(PaymentStatus::Canceled));
        assert!(!cancelable(PaymentStatus::Failed));
        assert!(!cancelable(PaymentStatus::Expired));
    }

    // =========================================================================
    // Duration is resolved at creation time from the billing period
    // =========================================================================
    #[test]
    fn test_duration_resolved_from_period() {
        assert_eq!(BillingPeriod::Monthly.duration_days(), 30);
        assert_eq!(BillingPeriod::Yearly.duration_days(), 365);
    }
}

// Tests against a live Postgres instance; skipped when DATABASE_URL is unset.
#[cfg(test)]
mod fan_out_scope_tests {
    use crate::activation::{ActivationOutcome, ActivationService};
    use carrierport_shared::{create_pool, run_migrations, SubscriptionPlan};
    use sqlx::PgPool;
    use uuid::Uuid;

    async fn test_pool() -> Option<PgPool> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let pool = create_pool(&url).await.ok()?;
        run_migrations(&pool).await.ok()?;
        Some(pool)
    }

    async fn seed_account(pool: &PgPool) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO accounts (id, email) VALUES ($1, $2)")
            .bind(id)
            .bind(format!("{}@example.com", id))
            .execute(pool)
            .await
            .unwrap();
        id
    }

    async fn seed_profile(pool: &PgPool, owner_id: Option<Uuid>) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO carrier_profiles (id, owner_id, name) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(owner_id)
            .bind("Test Carrier")
            .execute(pool)
            .await
            .unwrap();
        id
    }

    async fn profile_plan(pool: &PgPool, profile_id: Uuid) -> String {
        sqlx::query_scalar("SELECT plan FROM carrier_profiles WHERE id = $1")
            .bind(profile_id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    // =========================================================================
    // The fan-out touches only profiles owned by the activated account:
    // another account's profiles and ownerless import profiles stay untouched
    // =========================================================================
    #[tokio::test]
    async fn test_fan_out_scoped_to_owning_account() {
        let Some(pool) = test_pool().await else {
            return;
        };

        let target = seed_account(&pool).await;
        let bystander = seed_account(&pool).await;
        let owned_a = seed_profile(&pool, Some(target)).await;
        let owned_b = seed_profile(&pool, Some(target)).await;
        let foreign = seed_profile(&pool, Some(bystander)).await;
        let imported = seed_profile(&pool, None).await;

        let service = ActivationService::new(pool.clone());
        let outcome = service
            .activate_account(target, SubscriptionPlan::Premium, 30)
            .await
            .unwrap();

        let ActivationOutcome::Activated {
            profiles_updated, ..
        } = outcome
        else {
            panic!("expected activation, got {:?}", outcome);
        };
        assert_eq!(profiles_updated, 2);

        assert_eq!(profile_plan(&pool, owned_a).await, "premium");
        assert_eq!(profile_plan(&pool, owned_b).await, "premium");
        assert_eq!(profile_plan(&pool, foreign).await, "none");
        assert_eq!(profile_plan(&pool, imported).await, "none");
    }

    // =========================================================================
    // Zero owned profiles is a valid no-op, not an error
    // =========================================================================
    #[tokio::test]
    async fn test_fan_out_with_no_owned_profiles() {
        let Some(pool) = test_pool().await else {
            return;
        };

        let account = seed_account(&pool).await;
        let service = ActivationService::new(pool.clone());
        let outcome = service
            .activate_account(account, SubscriptionPlan::Business, 365)
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            ActivationOutcome::Activated {
                profiles_updated: 0,
                ..
            }
        ));
    }
}

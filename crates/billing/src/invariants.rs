//! Subscription invariants
//!
//! Runnable consistency checks over accounts, carrier profiles, and payment
//! records. Checks only read, never write, and can be run after any mutation
//! or webhook replay; violations carry enough context to debug.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::BillingResult;

/// Result of running a single invariant check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvariantViolation {
    /// Which invariant was violated
    pub invariant: String,
    /// Account(s) affected
    pub account_ids: Vec<Uuid>,
    /// Human-readable description of the violation
    pub description: String,
    /// Additional context for debugging
    pub context: serde_json::Value,
    /// Severity level
    pub severity: ViolationSeverity,
}

/// Severity of an invariant violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationSeverity {
    /// Critical - customers may see wrong subscription state
    Critical,
    /// High - data inconsistency that needs attention
    High,
    /// Medium - potential issue, should investigate
    Medium,
}

impl std::fmt::Display for ViolationSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViolationSeverity::Critical => write!(f, "CRITICAL"),
            ViolationSeverity::High => write!(f, "HIGH"),
            ViolationSeverity::Medium => write!(f, "MEDIUM"),
        }
    }
}

/// Summary of all invariant checks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvariantCheckSummary {
    pub checked_at: OffsetDateTime,
    pub checks_run: usize,
    pub checks_passed: usize,
    pub checks_failed: usize,
    pub violations: Vec<InvariantViolation>,
    pub healthy: bool,
}

#[derive(Debug, sqlx::FromRow)]
struct FlagMismatchRow {
    account_id: Uuid,
    plan: String,
    is_premium: bool,
}

#[derive(Debug, sqlx::FromRow)]
struct ProfileMismatchRow {
    profile_id: Uuid,
    owner_id: Uuid,
    profile_plan: String,
    account_plan: String,
}

#[derive(Debug, sqlx::FromRow)]
struct PaidWithoutTimestampRow {
    payment_id: Uuid,
    account_id: Uuid,
}

#[derive(Debug, sqlx::FromRow)]
struct ExpiryMismatchRow {
    account_id: Uuid,
    plan: String,
    has_expiry: bool,
}

/// Service for running subscription invariant checks
pub struct InvariantChecker {
    pool: PgPool,
}

impl InvariantChecker {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run all invariant checks and return summary
    pub async fn run_all_checks(&self) -> BillingResult<InvariantCheckSummary> {
        let now = OffsetDateTime::now_utc();
        let mut violations = Vec::new();

        violations.extend(self.check_premium_flag_consistency().await?);
        violations.extend(self.check_profile_mirror_consistency().await?);
        violations.extend(self.check_paid_has_paid_at().await?);
        violations.extend(self.check_expiry_only_when_subscribed().await?);

        let checks_run = 4;
        let checks_failed = violations
            .iter()
            .map(|v| &v.invariant)
            .collect::<std::collections::HashSet<_>>()
            .len();
        let checks_passed = checks_run - checks_failed;

        Ok(InvariantCheckSummary {
            checked_at: now,
            checks_run,
            checks_passed,
            checks_failed,
            healthy: violations.is_empty(),
            violations,
        })
    }

    /// Invariant 1: `is_premium == (plan != 'none')` on every account
    ///
    /// The flag is stored redundantly for fast reads; a mismatch means a
    /// write bypassed the projection boundary.
    async fn check_premium_flag_consistency(&self) -> BillingResult<Vec<InvariantViolation>> {
        let rows: Vec<FlagMismatchRow> = sqlx::query_as(
            r#"
            SELECT id as account_id, plan, is_premium
            FROM accounts
            WHERE is_premium != (plan != 'none')
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| InvariantViolation {
                invariant: "premium_flag_consistency".to_string(),
                account_ids: vec![row.account_id],
                description: format!(
                    "Account has plan '{}' but is_premium = {}",
                    row.plan, row.is_premium
                ),
                context: serde_json::json!({
                    "plan": row.plan,
                    "is_premium": row.is_premium,
                }),
                severity: ViolationSeverity::Critical,
            })
            .collect())
    }

    /// Invariant 2: owned carrier profiles mirror their account's plan
    ///
    /// Staleness is tolerated between activation events, but a profile
    /// differing from its owner after the last projection indicates a
    /// partial fan-out.
    async fn check_profile_mirror_consistency(&self) -> BillingResult<Vec<InvariantViolation>> {
        let rows: Vec<ProfileMismatchRow> = sqlx::query_as(
            r#"
            SELECT
                p.id as profile_id,
                p.owner_id,
                p.plan as profile_plan,
                a.plan as account_plan
            FROM carrier_profiles p
            JOIN accounts a ON a.id = p.owner_id
            WHERE p.plan != a.plan
               OR p.is_premium != a.is_premium
               OR p.premium_expires_at IS DISTINCT FROM a.premium_expires_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| InvariantViolation {
                invariant: "profile_mirror_consistency".to_string(),
                account_ids: vec![row.owner_id],
                description: format!(
                    "Carrier profile has plan '{}' but owning account has '{}'",
                    row.profile_plan, row.account_plan
                ),
                context: serde_json::json!({
                    "profile_id": row.profile_id,
                    "profile_plan": row.profile_plan,
                    "account_plan": row.account_plan,
                }),
                severity: ViolationSeverity::High,
            })
            .collect())
    }

    /// Invariant 3: `paid` records carry a `paid_at` timestamp
    async fn check_paid_has_paid_at(&self) -> BillingResult<Vec<InvariantViolation>> {
        let rows: Vec<PaidWithoutTimestampRow> = sqlx::query_as(
            r#"
            SELECT id as payment_id, account_id
            FROM payment_records
            WHERE status = 'paid' AND paid_at IS NULL
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| InvariantViolation {
                invariant: "paid_has_paid_at".to_string(),
                account_ids: vec![row.account_id],
                description: "Paid payment record has no paid_at timestamp".to_string(),
                context: serde_json::json!({
                    "payment_id": row.payment_id,
                }),
                severity: ViolationSeverity::High,
            })
            .collect())
    }

    /// Invariant 4: expiry is set exactly when a paid plan is active
    async fn check_expiry_only_when_subscribed(&self) -> BillingResult<Vec<InvariantViolation>> {
        let rows: Vec<ExpiryMismatchRow> = sqlx::query_as(
            r#"
            SELECT
                id as account_id,
                plan,
                premium_expires_at IS NOT NULL as has_expiry
            FROM accounts
            WHERE (plan = 'none') != (premium_expires_at IS NULL)
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| InvariantViolation {
                invariant: "expiry_only_when_subscribed".to_string(),
                account_ids: vec![row.account_id],
                description: format!(
                    "Account has plan '{}' but expiry presence = {}",
                    row.plan, row.has_expiry
                ),
                context: serde_json::json!({
                    "plan": row.plan,
                    "has_expiry": row.has_expiry,
                }),
                severity: ViolationSeverity::Medium,
            })
            .collect())
    }

    /// Run a single invariant check by name
    pub async fn run_check(&self, name: &str) -> BillingResult<Vec<InvariantViolation>> {
        match name {
            "premium_flag_consistency" => self.check_premium_flag_consistency().await,
            "profile_mirror_consistency" => self.check_profile_mirror_consistency().await,
            "paid_has_paid_at" => self.check_paid_has_paid_at().await,
            "expiry_only_when_subscribed" => self.check_expiry_only_when_subscribed().await,
            _ => Ok(vec![]),
        }
    }

    /// Get list of all available invariant checks
    pub fn available_checks() -> Vec<&'static str> {
        vec![
            "premium_flag_consistency",
            "profile_mirror_consistency",
            "paid_has_paid_at",
            "expiry_only_when_subscribed",
        ]
    }
}

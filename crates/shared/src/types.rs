//! Core subscription domain types

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Settlement currency for all charges
pub const CURRENCY: &str = "EUR";

/// Subscription plan of an account (and, mirrored, of its carrier profiles)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionPlan {
    /// Not subscribed
    None,
    Premium,
    Business,
}

impl SubscriptionPlan {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionPlan::None => "none",
            SubscriptionPlan::Premium => "premium",
            SubscriptionPlan::Business => "business",
        }
    }

    /// Whether this plan grants premium visibility
    pub fn is_paid(&self) -> bool {
        !matches!(self, SubscriptionPlan::None)
    }
}

impl std::str::FromStr for SubscriptionPlan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(SubscriptionPlan::None),
            "premium" => Ok(SubscriptionPlan::Premium),
            "business" => Ok(SubscriptionPlan::Business),
            other => Err(format!("unknown subscription plan '{}'", other)),
        }
    }
}

impl std::fmt::Display for SubscriptionPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Billing period selected at purchase time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingPeriod {
    Monthly,
    Yearly,
}

impl BillingPeriod {
    /// Subscription duration granted by one payment for this period
    pub fn duration_days(&self) -> i64 {
        match self {
            BillingPeriod::Monthly => 30,
            BillingPeriod::Yearly => 365,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BillingPeriod::Monthly => "monthly",
            BillingPeriod::Yearly => "yearly",
        }
    }
}

impl std::str::FromStr for BillingPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "monthly" => Ok(BillingPeriod::Monthly),
            "yearly" => Ok(BillingPeriod::Yearly),
            other => Err(format!("unknown billing period '{}'", other)),
        }
    }
}

impl std::fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status of a payment record
///
/// `Pending` is the only non-terminal status. Once a record reaches a
/// terminal status it must never be reopened, and a late or duplicate
/// gateway report must never regress it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Canceled,
    Expired,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Canceled => "canceled",
            PaymentStatus::Expired => "expired",
        }
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "failed" => Ok(PaymentStatus::Failed),
            "canceled" => Ok(PaymentStatus::Canceled),
            "expired" => Ok(PaymentStatus::Expired),
            other => Err(format!("unknown payment status '{}'", other)),
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Price in cents for a plan/period combination
///
/// Returns `None` for the free plan, which cannot be purchased.
pub fn price_cents(plan: SubscriptionPlan, period: BillingPeriod) -> Option<i64> {
    match (plan, period) {
        (SubscriptionPlan::None, _) => None,
        (SubscriptionPlan::Premium, BillingPeriod::Monthly) => Some(999),
        (SubscriptionPlan::Premium, BillingPeriod::Yearly) => Some(9_900),
        (SubscriptionPlan::Business, BillingPeriod::Monthly) => Some(2_499),
        (SubscriptionPlan::Business, BillingPeriod::Yearly) => Some(24_900),
    }
}

/// The subscription triple written to an account and fanned out to its
/// carrier profiles.
///
/// The `is_premium` flag is stored redundantly for fast reads and must always
/// equal `plan != none`. The only way to build a projection is through the
/// constructors below, so the invariant holds at every update boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlanProjection {
    pub plan: SubscriptionPlan,
    pub is_premium: bool,
    pub expires_at: Option<OffsetDateTime>,
}

impl PlanProjection {
    /// Projection for an activated paid plan
    pub fn active(plan: SubscriptionPlan, expires_at: OffsetDateTime) -> Self {
        Self {
            plan,
            is_premium: plan.is_paid(),
            expires_at: Some(expires_at),
        }
    }

    /// Projection for an unsubscribed account
    pub fn cleared() -> Self {
        Self {
            plan: SubscriptionPlan::None,
            is_premium: false,
            expires_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use time::Duration;

    #[test]
    fn test_plan_roundtrip() {
        for plan in [
            SubscriptionPlan::None,
            SubscriptionPlan::Premium,
            SubscriptionPlan::Business,
        ] {
            assert_eq!(SubscriptionPlan::from_str(plan.as_str()).unwrap(), plan);
        }
        assert!(SubscriptionPlan::from_str("gold").is_err());
    }

    #[test]
    fn test_paid_plans() {
        assert!(!SubscriptionPlan::None.is_paid());
        assert!(SubscriptionPlan::Premium.is_paid());
        assert!(SubscriptionPlan::Business.is_paid());
    }

    #[test]
    fn test_period_durations() {
        assert_eq!(BillingPeriod::Monthly.duration_days(), 30);
        assert_eq!(BillingPeriod::Yearly.duration_days(), 365);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!PaymentStatus::Pending.is_terminal());
        assert!(PaymentStatus::Paid.is_terminal());
        assert!(PaymentStatus::Failed.is_terminal());
        assert!(PaymentStatus::Canceled.is_terminal());
        assert!(PaymentStatus::Expired.is_terminal());
    }

    #[test]
    fn test_pricing_table() {
        assert_eq!(price_cents(SubscriptionPlan::None, BillingPeriod::Monthly), None);
        assert_eq!(
            price_cents(SubscriptionPlan::Premium, BillingPeriod::Monthly),
            Some(999)
        );
        assert_eq!(
            price_cents(SubscriptionPlan::Premium, BillingPeriod::Yearly),
            Some(9_900)
        );
        assert_eq!(
            price_cents(SubscriptionPlan::Business, BillingPeriod::Monthly),
            Some(2_499)
        );
        assert_eq!(
            price_cents(SubscriptionPlan::Business, BillingPeriod::Yearly),
            Some(24_900)
        );
    }

    #[test]
    fn test_projection_flag_matches_plan() {
        let expiry = OffsetDateTime::now_utc() + Duration::days(30);

        let active = PlanProjection::active(SubscriptionPlan::Premium, expiry);
        assert!(active.is_premium);
        assert_eq!(active.is_premium, active.plan.is_paid());
        assert_eq!(active.expires_at, Some(expiry));

        let cleared = PlanProjection::cleared();
        assert!(!cleared.is_premium);
        assert_eq!(cleared.is_premium, cleared.plan.is_paid());
        assert_eq!(cleared.expires_at, None);
    }
}

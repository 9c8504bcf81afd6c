// Shared crate clippy configuration
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Carrierport Shared Library
//!
//! Domain types and database helpers shared between the API server and the
//! billing crate: subscription plans, billing periods, payment statuses,
//! the pricing table, and Postgres pool construction.

pub mod db;
pub mod types;

pub use db::{create_pool, run_migrations};
pub use types::{
    price_cents, BillingPeriod, PaymentStatus, PlanProjection, SubscriptionPlan, CURRENCY,
};

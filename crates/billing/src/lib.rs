// Billing crate clippy configuration
// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Carrierport Billing Module
//!
//! Handles payment provider integration for carrier subscriptions.
//!
//! ## Features
//!
//! - **Payment Records**: Create, view, cancel plan purchases
//! - **Gateway Adapter**: Create charge, patch redirect, fetch authoritative
//!   status, best-effort cancel
//! - **Subscription Activation**: The single state-transition routine that
//!   activates an account and fans the plan out to its carrier profiles
//! - **Webhooks**: Handle asynchronous provider notifications idempotently
//! - **Invariants**: Runnable consistency checks over subscription state

pub mod activation;
pub mod error;
pub mod gateway;
pub mod invariants;
pub mod payments;
pub mod webhooks;

#[cfg(test)]
mod edge_case_tests;

// Activation
pub use activation::{
    decide, ActivationOutcome, ActivationService, CancellationResult, Transition,
};

// Error
pub use error::{BillingError, BillingResult};

// Gateway
pub use gateway::{ChargeStatus, GatewayClient, GatewayConfig, RemoteCharge, RemoteStatus};

// Invariants
pub use invariants::{
    InvariantCheckSummary, InvariantChecker, InvariantViolation, ViolationSeverity,
};

// Payments
pub use payments::{CreatedPayment, PaymentService, PaymentView};

// Webhooks
pub use webhooks::WebhookHandler;

use sqlx::PgPool;

/// Main billing service that combines all billing functionality
pub struct BillingService {
    pub payments: PaymentService,
    pub activation: ActivationService,
    pub webhooks: WebhookHandler,
    pub invariants: InvariantChecker,
}

impl BillingService {
    /// Create a new billing service from environment variables
    pub fn from_env(pool: PgPool) -> BillingResult<Self> {
        let gateway = GatewayClient::from_env()?;
        Ok(Self::new(gateway, pool))
    }

    /// Create a new billing service with an explicit gateway client
    pub fn new(gateway: GatewayClient, pool: PgPool) -> Self {
        Self {
            payments: PaymentService::new(gateway.clone(), pool.clone()),
            activation: ActivationService::new(pool.clone()),
            webhooks: WebhookHandler::new(gateway, pool.clone()),
            invariants: InvariantChecker::new(pool),
        }
    }
}

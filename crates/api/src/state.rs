//! Application state

use sqlx::PgPool;
use std::sync::Arc;

use carrierport_billing::{BillingResult, BillingService};

use crate::config::Config;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub billing: Arc<BillingService>,
}

impl AppState {
    /// Build the state, constructing the billing service from the environment
    ///
    /// Missing provider credentials fail here, at startup, never at the first
    /// purchase.
    pub fn from_env(pool: PgPool, config: Config) -> BillingResult<Self> {
        let billing = BillingService::from_env(pool.clone())?;
        tracing::info!("Payment gateway adapter initialized");

        Ok(Self {
            pool,
            config,
            billing: Arc::new(billing),
        })
    }
}

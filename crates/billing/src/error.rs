//! Billing error types

use thiserror::Error;

/// Errors produced by the billing subsystem
///
/// The HTTP layer maps these onto status codes: `Config` and `Database` are
/// 500s, `NotFound` is 404, `InvalidState` and `NotSubscribed` are 400s,
/// `Upstream` is 502.
#[derive(Debug, Error)]
pub enum BillingError {
    /// Missing or invalid provider credentials; fatal at adapter construction
    #[error("billing configuration error: {0}")]
    Config(String),

    /// Unknown payment record, account, or carrier profile reference
    #[error("not found: {0}")]
    NotFound(String),

    /// Action attempted against a record in a state that forbids it
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Subscription cancellation requested for an account with no active plan
    #[error("account has no active subscription")]
    NotSubscribed,

    /// Payment gateway call failed or timed out
    #[error("payment gateway error: {0}")]
    Upstream(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type BillingResult<T> = Result<T, BillingError>;

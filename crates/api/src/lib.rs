// API crate clippy configuration
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Carrierport API Library
//!
//! HTTP boundary of the transport-marketplace subscription core: payment
//! initiation, provider webhooks, payment status, and subscription
//! cancellation.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use state::AppState;

//! Payment gateway adapter
//!
//! Wraps the external payment provider's charge API behind a small client:
//! create a charge, patch its redirect URL, fetch its authoritative status,
//! cancel it. Any provider exposing this shape is substitutable.
//!
//! The redirect URL is patched in a second step because it embeds the local
//! payment id, which is only known after the charge has been created; the
//! create-then-patch protocol is dictated by the provider.

use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

use crate::error::{BillingError, BillingResult};

/// Attempts for the authoritative status fetch (webhook processing depends on it)
const FETCH_STATUS_RETRIES: usize = 2;

/// Charge status as reported by the payment provider
///
/// `Unknown` carries statuses this adapter does not recognize; callers treat
/// them as "no transition".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeStatus {
    Pending,
    Paid,
    Failed,
    Canceled,
    Expired,
    Unknown(String),
}

impl ChargeStatus {
    /// Parse the provider's status string
    pub fn parse(s: &str) -> Self {
        match s {
            "open" | "pending" => ChargeStatus::Pending,
            "paid" => ChargeStatus::Paid,
            "failed" => ChargeStatus::Failed,
            "canceled" => ChargeStatus::Canceled,
            "expired" => ChargeStatus::Expired,
            other => ChargeStatus::Unknown(other.to_string()),
        }
    }
}

impl std::fmt::Display for ChargeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChargeStatus::Pending => write!(f, "pending"),
            ChargeStatus::Paid => write!(f, "paid"),
            ChargeStatus::Failed => write!(f, "failed"),
            ChargeStatus::Canceled => write!(f, "canceled"),
            ChargeStatus::Expired => write!(f, "expired"),
            ChargeStatus::Unknown(s) => write!(f, "unknown({})", s),
        }
    }
}

/// A charge created at the provider
#[derive(Debug, Clone)]
pub struct RemoteCharge {
    pub external_id: String,
    pub checkout_url: Option<String>,
    pub status: ChargeStatus,
}

/// Authoritative charge status fetched from the provider
#[derive(Debug, Clone)]
pub struct RemoteStatus {
    pub status: ChargeStatus,
    /// Full provider payload, kept for audit logging
    pub raw: serde_json::Value,
}

/// Gateway configuration loaded from the environment
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Provider API key (bearer token)
    pub api_key: String,
    /// Provider API base URL, e.g. `https://api.provider.com/v1`
    pub api_url: String,
    /// Public URL the provider calls back with payment notifications
    pub webhook_url: String,
    /// Public base URL customers are redirected to after checkout
    pub redirect_base_url: String,
    /// Per-request timeout for gateway calls
    pub timeout: Duration,
}

impl GatewayConfig {
    /// Load from environment variables
    ///
    /// Missing credentials surface immediately as a `Config` error; the
    /// service must not start and defer the failure to the first purchase.
    pub fn from_env() -> BillingResult<Self> {
        let api_key = std::env::var("PAYMENT_API_KEY")
            .map_err(|_| BillingError::Config("PAYMENT_API_KEY not set".to_string()))?;
        let api_url = std::env::var("PAYMENT_API_URL")
            .map_err(|_| BillingError::Config("PAYMENT_API_URL not set".to_string()))?;
        let webhook_url = std::env::var("PAYMENT_WEBHOOK_URL")
            .map_err(|_| BillingError::Config("PAYMENT_WEBHOOK_URL not set".to_string()))?;
        let redirect_base_url = std::env::var("PAYMENT_REDIRECT_BASE")
            .map_err(|_| BillingError::Config("PAYMENT_REDIRECT_BASE not set".to_string()))?;
        let timeout_secs = std::env::var("PAYMENT_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);

        Self::validate(Self {
            api_key,
            api_url,
            webhook_url,
            redirect_base_url,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    fn validate(config: Self) -> BillingResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(BillingError::Config("PAYMENT_API_KEY is empty".to_string()));
        }
        if config.api_url.trim().is_empty() {
            return Err(BillingError::Config("PAYMENT_API_URL is empty".to_string()));
        }
        Ok(config)
    }
}

#[derive(Debug, Deserialize)]
struct ChargeResponse {
    id: String,
    status: String,
    checkout_url: Option<String>,
}

/// HTTP client for the payment provider
#[derive(Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    config: GatewayConfig,
}

impl GatewayClient {
    pub fn new(config: GatewayConfig) -> BillingResult<Self> {
        let config = GatewayConfig::validate(config)?;
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BillingError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { http, config })
    }

    pub fn from_env() -> BillingResult<Self> {
        Self::new(GatewayConfig::from_env()?)
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Create a charge at the provider
    pub async fn create_charge(
        &self,
        amount_cents: i64,
        currency: &str,
        description: &str,
        metadata: serde_json::Value,
    ) -> BillingResult<RemoteCharge> {
        let url = format!("{}/charges", self.config.api_url);
        let body = json!({
            "amount_cents": amount_cents,
            "currency": currency,
            "description": description,
            "metadata": metadata,
            "webhook_url": self.config.webhook_url,
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| BillingError::Upstream(format!("create charge request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            return Err(BillingError::Upstream(format!(
                "create charge failed ({}): {}",
                status, error_body
            )));
        }

        let charge: ChargeResponse = response
            .json()
            .await
            .map_err(|e| BillingError::Upstream(format!("invalid create charge response: {}", e)))?;

        tracing::info!(
            external_id = %charge.id,
            amount_cents = amount_cents,
            currency = currency,
            "Created charge at payment provider"
        );

        Ok(RemoteCharge {
            status: ChargeStatus::parse(&charge.status),
            external_id: charge.id,
            checkout_url: charge.checkout_url,
        })
    }

    /// Patch the redirect URL onto an existing charge
    pub async fn update_redirect(
        &self,
        external_id: &str,
        redirect_url: &str,
    ) -> BillingResult<()> {
        let url = format!("{}/charges/{}", self.config.api_url, external_id);

        let response = self
            .http
            .patch(&url)
            .bearer_auth(&self.config.api_key)
            .json(&json!({ "redirect_url": redirect_url }))
            .send()
            .await
            .map_err(|e| BillingError::Upstream(format!("update redirect request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(BillingError::Upstream(format!(
                "update redirect failed ({})",
                status
            )));
        }

        Ok(())
    }

    /// Fetch the authoritative charge status
    ///
    /// This is the source of truth for webhook processing; the notification
    /// body is never trusted. Retried with exponential backoff since a
    /// transient failure here would otherwise bounce the whole delivery back
    /// to the provider.
    pub async fn fetch_status(&self, external_id: &str) -> BillingResult<RemoteStatus> {
        let url = format!("{}/charges/{}", self.config.api_url, external_id);
        let strategy = ExponentialBackoff::from_millis(50)
            .map(jitter)
            .take(FETCH_STATUS_RETRIES);

        let raw: serde_json::Value = Retry::spawn(strategy, || async {
            let response = self
                .http
                .get(&url)
                .bearer_auth(&self.config.api_key)
                .send()
                .await
                .map_err(|e| BillingError::Upstream(format!("fetch status request failed: {}", e)))?;

            if !response.status().is_success() {
                let status = response.status();
                let error_body = response.text().await.unwrap_or_default();
                return Err(BillingError::Upstream(format!(
                    "fetch status failed ({}): {}",
                    status, error_body
                )));
            }

            response
                .json::<serde_json::Value>()
                .await
                .map_err(|e| BillingError::Upstream(format!("invalid status response: {}", e)))
        })
        .await?;

        let status = raw
            .get("status")
            .and_then(|s| s.as_str())
            .map(ChargeStatus::parse)
            .ok_or_else(|| {
                BillingError::Upstream("status response has no status field".to_string())
            })?;

        Ok(RemoteStatus { status, raw })
    }

    /// Cancel a charge at the provider
    ///
    /// Best-effort: callers that only need local consistency log and swallow
    /// the error.
    pub async fn cancel_charge(&self, external_id: &str) -> BillingResult<()> {
        let url = format!("{}/charges/{}", self.config.api_url, external_id);

        let response = self
            .http
            .delete(&url)
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|e| BillingError::Upstream(format!("cancel charge request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(BillingError::Upstream(format!(
                "cancel charge failed ({})",
                status
            )));
        }

        tracing::info!(external_id = %external_id, "Canceled charge at payment provider");
        Ok(())
    }
}

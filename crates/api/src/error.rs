//! API error types and HTTP mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use carrierport_billing::BillingError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Billing(#[from] BillingError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Billing(e) => match e {
                BillingError::NotFound(_) => StatusCode::NOT_FOUND,
                BillingError::InvalidState(_) | BillingError::NotSubscribed => {
                    StatusCode::BAD_REQUEST
                }
                BillingError::Upstream(_) => StatusCode::BAD_GATEWAY,
                BillingError::Config(_)
                | BillingError::Database(_)
                | BillingError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to clients
    ///
    /// Internal errors are logged with detail but surfaced generically.
    fn public_message(&self) -> String {
        match self.status_code() {
            StatusCode::INTERNAL_SERVER_ERROR => "internal server error".to_string(),
            StatusCode::BAD_GATEWAY => "payment provider unavailable".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = %self, status = %status, "Request failed");
        } else {
            tracing::debug!(error = %self, status = %status, "Request rejected");
        }

        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_billing_error_status_mapping() {
        let cases = [
            (
                ApiError::Billing(BillingError::NotFound("payment record x".into())),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::Billing(BillingError::InvalidState("cannot cancel".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::Billing(BillingError::NotSubscribed),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::Billing(BillingError::Upstream("timeout".into())),
                StatusCode::BAD_GATEWAY,
            ),
            (
                ApiError::Billing(BillingError::Config("missing key".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (ApiError::Unauthorized, StatusCode::UNAUTHORIZED),
            (ApiError::Forbidden, StatusCode::FORBIDDEN),
            (ApiError::BadRequest("missing id".into()), StatusCode::BAD_REQUEST),
        ];

        for (error, expected) in cases {
            assert_eq!(error.status_code(), expected, "{:?}", error);
        }
    }

    #[test]
    fn test_internal_detail_not_leaked() {
        let error = ApiError::Billing(BillingError::Config("PAYMENT_API_KEY not set".into()));
        assert_eq!(error.public_message(), "internal server error");

        let error = ApiError::Billing(BillingError::Upstream("connect refused 10.0.0.3".into()));
        assert_eq!(error.public_message(), "payment provider unavailable");
    }
}

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use be_remote_db::DbError;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    /// The payment provider failed or rejected the request.
    #[error("Payment provider error: {0}")]
    Provider(String),

    #[error("Checkout session not found: {0}")]
    SessionNotFound(String),

    /// A commit step failed after the idempotency check passed.
    #[error("Reconciliation failed: {0}")]
    Reconciliation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid value for field: {0}")]
    InvalidField(&'static str),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(#[from] DbError),

    #[error("{0}")]
    Internal(#[from] anyhow::Error),
}

impl PaymentError {
    pub fn reconciliation(err: impl std::fmt::Display) -> Self {
        Self::Reconciliation(err.to_string())
    }

    /// Stable label used for logs and analytics.
    pub fn kind(&self) -> &'static str {
        match self {
            PaymentError::Provider(_) => "provider",
            PaymentError::SessionNotFound(_) => "session_not_found",
            PaymentError::Reconciliation(_) => "reconciliation",
            PaymentError::Unauthorized(_) => "unauthorized",
            PaymentError::InvalidField(_) => "invalid_field",
            PaymentError::Config(_) => "config",
            PaymentError::Storage(_) => "storage",
            PaymentError::Internal(_) => "internal",
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for PaymentError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            PaymentError::Provider(_) => (
                StatusCode::BAD_GATEWAY,
                "Payment provider unavailable".to_string(),
            ),
            PaymentError::SessionNotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            PaymentError::Reconciliation(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Payment could not be recorded, retry the confirmation".to_string(),
            ),
            PaymentError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
            PaymentError::InvalidField(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            PaymentError::Config(_) | PaymentError::Storage(_) | PaymentError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        tracing::error!(%status, kind = self.kind(), error = %self, "Payment service error");

        (status, axum::Json(ErrorBody { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_taxonomy() {
        let cases = [
            (PaymentError::Provider("down".into()), StatusCode::BAD_GATEWAY),
            (
                PaymentError::SessionNotFound("cs_x".into()),
                StatusCode::NOT_FOUND,
            ),
            (
                PaymentError::Reconciliation("insert failed".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                PaymentError::Unauthorized("missing".into()),
                StatusCode::UNAUTHORIZED,
            ),
            (PaymentError::InvalidField("cost"), StatusCode::BAD_REQUEST),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}

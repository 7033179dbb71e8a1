//! The single error hierarchy for the claim pipeline.
//!
//! Every fallible operation in `address`, `hasher`, `verify`, `store` and
//! `coordinator` returns `Result<_, FaucetError>`. The HTTP layer converts a
//! `FaucetError` into the `{success: false, error}` envelope and status code
//! in exactly one place: the `IntoResponse` impl below.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum FaucetError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("bad signature: {0}")]
    BadSignature(String),

    #[error("address mismatch: recovered address does not match claimed address")]
    AddressMismatch,

    #[error("signature math check failed")]
    MathCheckFailed,

    #[error("address not found in snapshot")]
    NotFound,

    #[error("amount mismatch: requested {requested}, available {available}")]
    AmountMismatch { requested: u64, available: u64 },

    #[error("address already consumed")]
    AlreadyConsumed { destination_id: Option<String> },

    /// Persisted on purpose: the reservation already committed before the
    /// relay was attempted, so retrying automatically would risk a double
    /// mint if the upstream actually succeeded on its end. See the operator
    /// note on step 10 of the claim coordinator — reconciliation is manual.
    #[error("upstream relay failed: {0}")]
    UpstreamFailure(String),

    #[error("store failure: {0}")]
    StoreFailure(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl FaucetError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            FaucetError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            FaucetError::InvalidAddress(_) => StatusCode::BAD_REQUEST,
            FaucetError::BadSignature(_) => StatusCode::BAD_REQUEST,
            FaucetError::AddressMismatch => StatusCode::BAD_REQUEST,
            FaucetError::MathCheckFailed => StatusCode::BAD_REQUEST,
            FaucetError::NotFound => StatusCode::NOT_FOUND,
            FaucetError::AmountMismatch { .. } => StatusCode::BAD_REQUEST,
            FaucetError::AlreadyConsumed { .. } => StatusCode::CONFLICT,
            FaucetError::UpstreamFailure(_) => StatusCode::BAD_GATEWAY,
            FaucetError::StoreFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            FaucetError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to the client. `Internal` never leaks detail.
    pub fn user_message(&self) -> String {
        match self {
            FaucetError::Internal(_) => "internal error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for FaucetError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        tracing::warn!(error = %self, status = %status, "claim pipeline error");
        let body = Json(json!({
            "success": false,
            "error": self.user_message(),
        }));
        (status, body).into_response()
    }
}

impl From<rusqlite::Error> for FaucetError {
    fn from(e: rusqlite::Error) -> Self {
        FaucetError::StoreFailure(e.to_string())
    }
}

impl From<anyhow::Error> for FaucetError {
    fn from(e: anyhow::Error) -> Self {
        FaucetError::Internal(format!("{e:#}"))
    }
}

//! Application error types with Axum response mapping.
//!
//! Each variant maps to a specific HTTP status and a JSON body carrying a
//! human-readable `error` plus a stable `code`. Upstream library or provider
//! text stays in the logs and is never echoed to the client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::entra::validator::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Invalid or expired session")]
    InvalidSession,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Token rejected: {0}")]
    TokenRejected(#[from] ValidationError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::InvalidSession => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::TokenRejected(ValidationError::InsufficientPermission) => {
                StatusCode::FORBIDDEN
            }
            AppError::TokenRejected(ValidationError::KeySetUnavailable(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::TokenRejected(_) => StatusCode::UNAUTHORIZED,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Response body. Only generic categories leave the server.
    pub fn body(&self) -> serde_json::Value {
        match self {
            AppError::Unauthenticated => json!({
                "error": "Not authenticated",
                "code": "unauthenticated"
            }),
            AppError::InvalidSession => json!({
                "error": "Invalid or expired session",
                "code": "invalid_session"
            }),
            AppError::BadRequest(msg) => json!({"error": msg, "code": "bad_request"}),
            AppError::TokenRejected(ValidationError::ClaimRejected { field }) => json!({
                "error": "Invalid access token",
                "code": "claim_rejected",
                "field": field
            }),
            AppError::TokenRejected(ValidationError::InsufficientPermission) => json!({
                "error": "Access token lacks the required permission",
                "code": "insufficient_permission"
            }),
            AppError::TokenRejected(ValidationError::KeySetUnavailable(_)) => json!({
                "error": "Identity provider unavailable",
                "code": "key_set_unavailable"
            }),
            AppError::TokenRejected(e) => json!({
                "error": "Invalid access token",
                "code": e.code()
            }),
            AppError::Internal(_) => json!({"error": "Internal error", "code": "internal"}),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Internal(ref msg) = self {
            tracing::error!(error = %msg, "internal error");
        }
        (self.status(), axum::Json(self.body())).into_response()
    }
}

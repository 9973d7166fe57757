//! GET /health

use axum::Json;

use crate::types::HealthResponse;

/// Liveness probe. Does not touch the identity provider.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        mode: "token-exchange".into(),
    })
}

//! POST /api/auth/msal-exchange

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use std::sync::Arc;

use crate::audit;
use crate::error::AppError;
use crate::types::{ExchangeRequest, ExchangeResponse, UserProfile};

/// Exchange an Entra ID access token for an HRA session credential.
pub async fn msal_exchange(
    State(state): State<Arc<crate::AppState>>,
    body: Result<Json<ExchangeRequest>, JsonRejection>,
) -> Result<Json<ExchangeResponse>, AppError> {
    let Json(body) = body.map_err(|e| {
        tracing::debug!(error = %e, "unreadable exchange body");
        AppError::BadRequest("Invalid request body".into())
    })?;

    let access_token = body.access_token.trim();
    if access_token.is_empty() {
        return Err(AppError::BadRequest("Missing accessToken".into()));
    }

    let identity = match state.validator.validate(access_token).await {
        Ok(identity) => identity,
        Err(e) => {
            tracing::warn!(error = %e, code = e.code(), "access token rejected");
            audit::exchange_failed(e.code());
            return Err(e.into());
        }
    };

    let role = state.role_resolver.resolve(&identity.raw_roles);
    let credential = state
        .session_issuer
        .issue(&identity, role)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    tracing::info!(
        uid = %identity.external_id,
        raw_roles = ?identity.raw_roles,
        %role,
        "session issued"
    );
    audit::exchange_succeeded(&identity.email, &identity.external_id, role);

    let claims = credential.claims;
    Ok(Json(ExchangeResponse {
        token: credential.token,
        user: UserProfile {
            role: claims.role,
            name: claims.name,
            email: claims.email,
            id: claims.uid,
        },
    }))
}

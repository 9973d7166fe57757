//! GET /api/auth/msal-config

use axum::Json;
use axum::extract::State;
use std::sync::Arc;

use crate::types::{CacheOptions, MsalConfigResponse};

/// Public client settings the browser needs to construct its MSAL instance.
pub async fn msal_config(State(state): State<Arc<crate::AppState>>) -> Json<MsalConfigResponse> {
    Json(MsalConfigResponse {
        client_id: Some(state.config.client_id.clone()),
        tenant_id: Some(state.config.tenant_id.clone()),
        redirect_uri: Some(state.config.redirect_uri.clone()),
        cache: Some(CacheOptions::default()),
    })
}

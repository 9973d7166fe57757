//! HRA token exchange service.
//!
//! Verifies Microsoft Entra ID access tokens, maps app roles to one internal
//! role and issues a 12-hour stateless session credential. The [`client`]
//! module holds the matching client-side login orchestrator.

pub mod audit;
pub mod client;
pub mod config;
pub mod entra;
pub mod error;
pub mod roles;
pub mod routes;
pub mod session;
pub mod types;

use axum::Router;
use axum::http::{HeaderValue, Method, header};
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::entra::{IdentityTokenValidator, SigningKeySet};
use crate::roles::RoleResolver;
use crate::session::{SessionIssuer, require_session};

/// Shared application state available to all route handlers.
pub struct AppState {
    pub config: Config,
    pub http_client: reqwest::Client,
    pub key_set: Arc<SigningKeySet>,
    pub validator: IdentityTokenValidator,
    pub role_resolver: RoleResolver,
    pub session_issuer: SessionIssuer,
}

impl AppState {
    /// Wire every component from configuration. Outbound HTTP is bounded by
    /// `config.http_timeout`.
    pub fn new(config: Config) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;
        let key_set = Arc::new(SigningKeySet::new(
            http_client.clone(),
            config.jwks_url(),
            config.jwks_cache_ttl,
            config.jwks_cache_max_entries,
        ));

        Ok(Self {
            validator: IdentityTokenValidator::from_config(&config, key_set.clone()),
            role_resolver: config.role_resolver(),
            session_issuer: SessionIssuer::new(&config.jwt_secret),
            key_set,
            http_client,
            config,
        })
    }
}

/// Put `routes` behind the session middleware.
///
/// Downstream API routers (assessments, exports) are mounted through this.
pub fn protect(state: &Arc<AppState>, routes: Router<Arc<AppState>>) -> Router<Arc<AppState>> {
    routes.route_layer(from_fn_with_state(state.clone(), require_session))
}

/// Build the Axum router with all middleware and routes.
pub fn create_app(state: Arc<AppState>) -> Router {
    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);
    match HeaderValue::from_str(&state.config.frontend_url) {
        Ok(origin) => cors = cors.allow_origin(AllowOrigin::exact(origin)),
        Err(_) => tracing::warn!(
            frontend_url = %state.config.frontend_url,
            "FRONTEND_URL is not a valid origin, cross-origin requests disabled"
        ),
    }

    let protected = protect(
        &state,
        Router::new().route("/api/auth/me", get(routes::me::me)),
    );

    Router::new()
        .route("/health", get(routes::health::health))
        .route("/api/auth/msal-config", get(routes::msal_config::msal_config))
        .route(
            "/api/auth/msal-exchange",
            post(routes::exchange::msal_exchange),
        )
        .merge(protected)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

//! Application configuration via environment variables.
//!
//! Tenant and client ids identify the Entra ID app registration; everything
//! else has a default suitable for local development.

use std::env;
use std::time::Duration;

use crate::roles::{InternalRole, RoleResolver};

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub tenant_id: String,
    pub client_id: String,
    /// App ID URI of the protected API (the `aud` of exchanged tokens).
    pub api_audience: String,
    pub authority_host: String,
    pub jwt_secret: String,
    pub redirect_uri: String,
    pub frontend_url: String,
    pub port: u16,
    pub required_scope: String,
    pub default_role: InternalRole,
    /// Legacy external role name → internal role, in declaration order.
    pub role_mapping: Vec<(String, InternalRole)>,
    pub jwks_cache_ttl: Duration,
    pub jwks_cache_max_entries: usize,
    pub http_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required: `AZURE_TENANT_ID` (or `TENANT_ID`) and `AZURE_CLIENT_ID`
    /// (or `CLIENT_ID`).
    pub fn from_env() -> Result<Self, ConfigError> {
        let tenant_id = required_env_any(&["AZURE_TENANT_ID", "TENANT_ID"])?;
        let client_id = required_env_any(&["AZURE_CLIENT_ID", "CLIENT_ID"])?;

        let default_role = match env::var("DEFAULT_ROLE") {
            Ok(v) => v
                .parse()
                .map_err(|_| ConfigError::Invalid("DEFAULT_ROLE".into(), v))?,
            Err(_) => InternalRole::User,
        };

        let role_mapping = match env::var("ROLE_MAPPING") {
            Ok(v) if !v.trim().is_empty() => parse_role_mapping(&v)?,
            _ => RoleResolver::default_legacy_mapping(),
        };

        let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| {
            tracing::warn!("JWT_SECRET not set, using insecure development secret");
            "change-me-in-production".into()
        });

        Ok(Self {
            api_audience: env::var("API_AUDIENCE")
                .unwrap_or_else(|_| format!("api://{client_id}")),
            authority_host: env::var("AUTHORITY_HOST")
                .unwrap_or_else(|_| "https://login.microsoftonline.com".into())
                .trim_end_matches('/')
                .to_string(),
            jwt_secret,
            redirect_uri: env::var("REDIRECT_URI")
                .unwrap_or_else(|_| "http://localhost:3000/auth/callback".into()),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".into()),
            port: parse_env("PORT", 3001)?,
            required_scope: env::var("REQUIRED_SCOPE").unwrap_or_else(|_| "access".into()),
            default_role,
            role_mapping,
            jwks_cache_ttl: Duration::from_secs(parse_env("JWKS_CACHE_TTL_SECS", 600)?),
            jwks_cache_max_entries: parse_env("JWKS_CACHE_MAX_ENTRIES", 5)?,
            http_timeout: Duration::from_secs(parse_env("HTTP_TIMEOUT_SECS", 10)?),
            tenant_id,
            client_id,
        })
    }

    /// Tenant-scoped authority, e.g. `https://login.microsoftonline.com/{tenant}`.
    pub fn authority(&self) -> String {
        format!("{}/{}", self.authority_host, self.tenant_id)
    }

    /// Provider JWKS endpoint (v2.0 discovery keys).
    pub fn jwks_url(&self) -> String {
        format!("{}/discovery/v2.0/keys", self.authority())
    }

    /// Issuer strings accepted on exchanged tokens: v2.0 first, legacy v1 second.
    pub fn accepted_issuers(&self) -> Vec<String> {
        vec![
            format!("{}/v2.0", self.authority()),
            format!("https://sts.windows.net/{}/", self.tenant_id),
        ]
    }

    /// Audience identifiers accepted on exchanged tokens.
    pub fn accepted_audiences(&self) -> Vec<String> {
        let mut auds = vec![self.api_audience.clone()];
        if self.client_id != self.api_audience {
            auds.push(self.client_id.clone());
        }
        auds
    }

    /// Build the role resolver described by this configuration.
    pub fn role_resolver(&self) -> RoleResolver {
        RoleResolver::new(self.role_mapping.clone(), self.default_role)
    }
}

/// Fixed configuration for unit and integration tests.
impl Config {
    pub fn test_default() -> Self {
        Self {
            tenant_id: "11111111-2222-3333-4444-555555555555".into(),
            client_id: "test-client-id".into(),
            api_audience: "api://test-client-id".into(),
            authority_host: "https://login.microsoftonline.com".into(),
            jwt_secret: "test-secret-key".into(),
            redirect_uri: "https://localhost:3000/auth/callback".into(),
            frontend_url: "http://localhost:3000".into(),
            port: 3001,
            required_scope: "access".into(),
            default_role: InternalRole::User,
            role_mapping: RoleResolver::default_legacy_mapping(),
            jwks_cache_ttl: Duration::from_secs(600),
            jwks_cache_max_entries: 5,
            http_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("invalid value for {0}: {1:?}")]
    Invalid(String, String),
}

fn required_env_any(keys: &[&str]) -> Result<String, ConfigError> {
    keys.iter()
        .find_map(|k| env::var(k).ok().filter(|v| !v.is_empty()))
        .ok_or_else(|| ConfigError::MissingEnv(keys.join("|")))
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(v) => v
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(key.into(), v)),
        Err(_) => Ok(default),
    }
}

/// Parse `ext=internal,ext2=internal2` into an ordered mapping table.
pub fn parse_role_mapping(raw: &str) -> Result<Vec<(String, InternalRole)>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (external, internal) = pair
                .split_once('=')
                .ok_or_else(|| ConfigError::Invalid("ROLE_MAPPING".into(), pair.into()))?;
            let role = internal
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid("ROLE_MAPPING".into(), pair.into()))?;
            Ok((external.trim().to_string(), role))
        })
        .collect()
}

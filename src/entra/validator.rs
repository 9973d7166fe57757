//! Entra ID access-token verification for the exchange endpoint.
//!
//! Tokens arrive from the browser, so nothing in them is trusted until the
//! RS256 signature has been checked against the tenant's published keys.
//! Every rejection maps to one specific [`ValidationError`] variant.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, Validation, decode, decode_header};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use super::claims::{AccessTokenClaims, ResolvedIdentity};
use super::jwks::{KeySetError, SigningKeySet};
use crate::config::Config;

/// The only signature algorithm Entra ID uses for access tokens.
const ALLOWED_ALGORITHM: Algorithm = Algorithm::RS256;

/// Verifies external access tokens and extracts the caller's identity.
pub struct IdentityTokenValidator {
    keys: Arc<SigningKeySet>,
    tenant_id: String,
    issuers: Vec<String>,
    audiences: Vec<String>,
    required_scope: String,
}

impl IdentityTokenValidator {
    pub fn new(
        keys: Arc<SigningKeySet>,
        tenant_id: impl Into<String>,
        issuers: Vec<String>,
        audiences: Vec<String>,
        required_scope: impl Into<String>,
    ) -> Self {
        Self {
            keys,
            tenant_id: tenant_id.into(),
            issuers,
            audiences,
            required_scope: required_scope.into(),
        }
    }

    pub fn from_config(config: &Config, keys: Arc<SigningKeySet>) -> Self {
        Self::new(
            keys,
            config.tenant_id.clone(),
            config.accepted_issuers(),
            config.accepted_audiences(),
            config.required_scope.clone(),
        )
    }

    pub async fn validate(&self, token: &str) -> Result<ResolvedIdentity, ValidationError> {
        self.validate_at(token, unix_now()).await
    }

    /// Validate against a fixed clock (seconds since the epoch).
    pub async fn validate_at(
        &self,
        token: &str,
        now: u64,
    ) -> Result<ResolvedIdentity, ValidationError> {
        let header = decode_header(token).map_err(|_| ValidationError::MalformedToken)?;
        if header.alg != ALLOWED_ALGORITHM {
            return Err(ValidationError::DisallowedAlgorithm(format!("{:?}", header.alg)));
        }
        let kid = header.kid.ok_or(ValidationError::MalformedToken)?;

        let key = self
            .keys
            .get(&kid)
            .await?
            .ok_or(ValidationError::UnknownSigningKey(kid))?;

        let mut validation = Validation::new(ALLOWED_ALGORITHM);
        validation.set_issuer(&self.issuers);
        validation.set_audience(&self.audiences);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        // Time window is checked below against the caller's clock.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.leeway = 0;

        let claims = decode::<AccessTokenClaims>(token, &key, &validation)
            .map_err(map_jwt_error)?
            .claims;

        if let Some(tid) = claims.tid.as_deref()
            && tid != self.tenant_id
        {
            return Err(ValidationError::claim("tid"));
        }

        let exp = claims.exp.ok_or_else(|| ValidationError::claim("exp"))?;
        if now > exp {
            return Err(ValidationError::claim("exp"));
        }
        if claims.nbf.is_some_and(|nbf| now < nbf) {
            return Err(ValidationError::claim("nbf"));
        }

        if !claims.has_scope(&self.required_scope) && claims.roles.is_empty() {
            return Err(ValidationError::InsufficientPermission);
        }

        ResolvedIdentity::from_claims(claims).ok_or_else(|| ValidationError::claim("sub"))
    }
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> ValidationError {
    match err.kind() {
        ErrorKind::InvalidSignature | ErrorKind::InvalidRsaKey(_) => ValidationError::BadSignature,
        ErrorKind::InvalidIssuer => ValidationError::claim("iss"),
        ErrorKind::InvalidAudience => ValidationError::claim("aud"),
        ErrorKind::ExpiredSignature => ValidationError::claim("exp"),
        ErrorKind::ImmatureSignature => ValidationError::claim("nbf"),
        ErrorKind::MissingRequiredClaim(field) => ValidationError::claim(field),
        ErrorKind::InvalidAlgorithm => ValidationError::DisallowedAlgorithm("mismatch".into()),
        _ => ValidationError::MalformedToken,
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("malformed token")]
    MalformedToken,

    #[error("signing algorithm not allowed: {0}")]
    DisallowedAlgorithm(String),

    #[error("signing key not found for kid: {0}")]
    UnknownSigningKey(String),

    #[error("signature verification failed")]
    BadSignature,

    #[error("claim rejected: {field}")]
    ClaimRejected { field: String },

    #[error("token grants neither the required scope nor an app role")]
    InsufficientPermission,

    #[error("signing keys unavailable: {0}")]
    KeySetUnavailable(String),
}

impl ValidationError {
    pub fn claim(field: impl Into<String>) -> Self {
        ValidationError::ClaimRejected {
            field: field.into(),
        }
    }

    /// Stable machine-readable code exposed to clients.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::MalformedToken => "malformed_token",
            ValidationError::DisallowedAlgorithm(_) => "disallowed_algorithm",
            ValidationError::UnknownSigningKey(_) => "unknown_signing_key",
            ValidationError::BadSignature => "bad_signature",
            ValidationError::ClaimRejected { .. } => "claim_rejected",
            ValidationError::InsufficientPermission => "insufficient_permission",
            ValidationError::KeySetUnavailable(_) => "key_set_unavailable",
        }
    }
}

impl From<KeySetError> for ValidationError {
    fn from(err: KeySetError) -> Self {
        ValidationError::KeySetUnavailable(err.to_string())
    }
}

//! HS256 session credentials minted after a successful exchange.
//!
//! The credential is the only proof of authentication: the server keeps
//! no session state. Lifetime is fixed at 12 hours from issuance and a
//! credential is never extended; clients re-run the exchange instead.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::entra::claims::ResolvedIdentity;
use crate::entra::validator::unix_now;
use crate::roles::InternalRole;

/// Fixed session lifetime.
pub const SESSION_TTL: Duration = Duration::from_secs(12 * 3600);

/// Claims carried by a session credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub uid: String,
    pub email: String,
    pub name: String,
    pub role: InternalRole,
    pub iat: u64,
    pub exp: u64,
}

/// A signed credential plus the claims it carries.
#[derive(Debug, Clone)]
pub struct SessionCredential {
    pub token: String,
    pub claims: SessionClaims,
}

/// Mints and verifies session credentials with the server-held secret.
pub struct SessionIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl SessionIssuer {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl: SESSION_TTL,
        }
    }

    pub fn issue(
        &self,
        identity: &ResolvedIdentity,
        role: InternalRole,
    ) -> Result<SessionCredential, SessionError> {
        self.issue_at(identity, role, unix_now())
    }

    /// Mint a credential as if issued at `issued_at` (seconds since the epoch).
    pub fn issue_at(
        &self,
        identity: &ResolvedIdentity,
        role: InternalRole,
        issued_at: u64,
    ) -> Result<SessionCredential, SessionError> {
        let claims = SessionClaims {
            uid: identity.external_id.clone(),
            email: identity.email.clone(),
            name: identity.display_name.clone(),
            role,
            iat: issued_at,
            exp: issued_at + self.ttl.as_secs(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| SessionError::Signing(e.to_string()))?;

        Ok(SessionCredential { token, claims })
    }

    pub fn verify(&self, token: &str) -> Result<SessionClaims, SessionError> {
        self.verify_at(token, unix_now())
    }

    /// Verify signature and expiry against a fixed clock. Valid while `now < exp`.
    pub fn verify_at(&self, token: &str, now: u64) -> Result<SessionClaims, SessionError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp"]);
        validation.validate_exp = false;
        validation.leeway = 0;

        let claims = decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| SessionError::Invalid(e.to_string()))?
            .claims;

        if now >= claims.exp {
            return Err(SessionError::Expired);
        }
        Ok(claims)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to sign session credential: {0}")]
    Signing(String),

    #[error("invalid session credential: {0}")]
    Invalid(String),

    #[error("session credential expired")]
    Expired,
}

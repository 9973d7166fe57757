//! Axum bearer-credential middleware for protected routes.
//!
//! Reads `Authorization: Bearer <credential>`, verifies it with the
//! [`SessionIssuer`](super::token::SessionIssuer) and inserts the decoded
//! [`SessionIdentity`] into request extensions. Stateless: nothing is
//! loaded or saved, and expired credentials are rejected, never refreshed.

use axum::extract::{FromRequestParts, Request, State};
use axum::http::header;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;

use super::token::SessionClaims;
use crate::AppState;
use crate::audit;
use crate::error::AppError;

/// Verified caller identity, available to handlers behind the middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity(pub SessionClaims);

impl std::ops::Deref for SessionIdentity {
    type Target = SessionClaims;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Extract SessionIdentity from request extensions (put there by `require_session`).
impl<S> FromRequestParts<S> for SessionIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionIdentity>()
            .cloned()
            .ok_or(AppError::Unauthenticated)
    }
}

/// Axum middleware: 401 without a bearer credential, 403 with a bad one.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .ok_or(AppError::Unauthenticated)?;

    let claims = state.session_issuer.verify(token).map_err(|e| {
        tracing::debug!(error = %e, path = %req.uri().path(), "session credential rejected");
        audit::session_rejected(req.uri().path(), &e.to_string());
        AppError::InvalidSession
    })?;

    req.extensions_mut().insert(SessionIdentity(claims));
    Ok(next.run(req).await)
}

/// Parse a `Bearer <token>` header value. Scheme match is case-insensitive.
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_found() {
        assert_eq!(bearer_token("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(bearer_token("bearer  abc"), Some("abc"));
    }

    #[test]
    fn test_bearer_token_wrong_scheme() {
        assert_eq!(bearer_token("Basic dXNlcjpwYXNz"), None);
    }

    #[test]
    fn test_bearer_token_empty() {
        assert_eq!(bearer_token(""), None);
        assert_eq!(bearer_token("Bearer"), None);
        assert_eq!(bearer_token("Bearer   "), None);
    }
}

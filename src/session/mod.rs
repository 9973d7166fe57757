//! Stateless session credentials.
//!
//! `token` mints and verifies the HS256 credential handed out by the
//! exchange endpoint; `middleware` guards protected routes with it.

pub mod middleware;
pub mod token;

pub use middleware::{SessionIdentity, require_session};
pub use token::{SESSION_TTL, SessionClaims, SessionCredential, SessionError, SessionIssuer};

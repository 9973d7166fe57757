//! Microsoft Entra ID boundary: signing keys, claim schema, token validation.

pub mod claims;
pub mod jwks;
pub mod validator;

pub use claims::{AccessTokenClaims, ResolvedIdentity};
pub use jwks::{KeySetError, SigningKeySet};
pub use validator::{IdentityTokenValidator, ValidationError};

//! Entra ID access-token claims and the identity derived from them.

use serde::{Deserialize, Deserializer, Serialize};

/// Claims read from a verified Entra ID access token.
///
/// Only the fields the exchange needs; everything else is ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub oid: Option<String>,
    #[serde(default)]
    pub tid: Option<String>,
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default, deserialize_with = "string_or_seq")]
    pub aud: Vec<String>,
    #[serde(default)]
    pub exp: Option<u64>,
    #[serde(default)]
    pub nbf: Option<u64>,
    #[serde(default)]
    pub scp: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub preferred_username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub upn: Option<String>,
}

impl AccessTokenClaims {
    /// Delegated scopes from the space-separated `scp` claim.
    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.scp.as_deref().unwrap_or("").split_whitespace()
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes().any(|s| s == scope)
    }
}

/// Identity extracted from a validated external token. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedIdentity {
    pub external_id: String,
    pub display_name: String,
    pub email: String,
    pub raw_roles: Vec<String>,
    pub raw_groups: Vec<String>,
    pub tenant_id: Option<String>,
}

impl ResolvedIdentity {
    /// Single claim-extraction point.
    ///
    /// Fallbacks: id `oid` → `sub`; name `name` → `preferred_username`;
    /// email `email` → `preferred_username` → `upn`. Returns `None` when the
    /// token names no subject at all.
    pub fn from_claims(claims: AccessTokenClaims) -> Option<Self> {
        let external_id = non_empty(claims.oid).or(non_empty(claims.sub))?;
        let preferred = non_empty(claims.preferred_username);
        let email = non_empty(claims.email)
            .or_else(|| preferred.clone())
            .or(non_empty(claims.upn))
            .unwrap_or_default();
        let display_name = non_empty(claims.name)
            .or(preferred)
            .unwrap_or_else(|| email.clone());

        Some(Self {
            external_id,
            display_name,
            email,
            raw_roles: claims.roles,
            raw_groups: claims.groups,
            tenant_id: claims.tid,
        })
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty())
}

/// `aud` may be a single string or an array.
fn string_or_seq<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(s)) => vec![s],
        Some(OneOrMany::Many(v)) => v,
        None => Vec::new(),
    })
}

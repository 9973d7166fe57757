//! Internal role enumeration and Entra app-role resolution.
//!
//! Each session carries exactly one [`InternalRole`]. Resolution walks the
//! token's `roles` claim in provider order: an exact internal role name wins
//! first, then the legacy alias table, then the configured default. Ties go
//! to the first match, not the most privileged role.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Authorization level inside the HRA system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InternalRole {
    Admin,
    Superintendent,
    Arbetsledare,
    Supervisor,
    Underhall,
    User,
}

impl InternalRole {
    pub const ALL: [InternalRole; 6] = [
        InternalRole::Admin,
        InternalRole::Superintendent,
        InternalRole::Arbetsledare,
        InternalRole::Supervisor,
        InternalRole::Underhall,
        InternalRole::User,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InternalRole::Admin => "admin",
            InternalRole::Superintendent => "superintendent",
            InternalRole::Arbetsledare => "arbetsledare",
            InternalRole::Supervisor => "supervisor",
            InternalRole::Underhall => "underhall",
            InternalRole::User => "user",
        }
    }

    /// Roles that see the approval queue in the HRA workflow.
    pub fn can_approve(&self) -> bool {
        matches!(
            self,
            InternalRole::Admin
                | InternalRole::Superintendent
                | InternalRole::Arbetsledare
                | InternalRole::Supervisor
        )
    }
}

impl fmt::Display for InternalRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for InternalRole {
    type Err = UnknownRole;

    /// Exact, case-sensitive match on the wire name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InternalRole::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

/// Maps raw provider role strings to one [`InternalRole`].
#[derive(Debug, Clone)]
pub struct RoleResolver {
    legacy: HashMap<String, InternalRole>,
    default_role: InternalRole,
}

impl RoleResolver {
    pub fn new(mapping: Vec<(String, InternalRole)>, default_role: InternalRole) -> Self {
        let mut legacy = HashMap::with_capacity(mapping.len());
        for (external, internal) in mapping {
            // First declaration of an external name wins.
            legacy.entry(external).or_insert(internal);
        }
        Self {
            legacy,
            default_role,
        }
    }

    /// Built-in aliases for app-role values that predate the internal names.
    pub fn default_legacy_mapping() -> Vec<(String, InternalRole)> {
        [
            ("HRA.Admin", InternalRole::Admin),
            ("Administrator", InternalRole::Admin),
            ("HRA.Superintendent", InternalRole::Superintendent),
            ("Platschef", InternalRole::Superintendent),
            ("HRA.Arbetsledare", InternalRole::Arbetsledare),
            ("Foreman", InternalRole::Arbetsledare),
            ("HRA.Supervisor", InternalRole::Supervisor),
            ("HRA.Underhall", InternalRole::Underhall),
            ("Maintenance", InternalRole::Underhall),
            ("HRA.User", InternalRole::User),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }

    pub fn default_role(&self) -> InternalRole {
        self.default_role
    }

    /// Resolve the session role from the token's raw role list. Never fails.
    pub fn resolve<S: AsRef<str>>(&self, raw_roles: &[S]) -> InternalRole {
        let direct = raw_roles
            .iter()
            .find_map(|r| r.as_ref().parse::<InternalRole>().ok());
        if let Some(role) = direct {
            return role;
        }

        raw_roles
            .iter()
            .find_map(|r| self.legacy.get(r.as_ref()).copied())
            .unwrap_or(self.default_role)
    }
}

impl Default for RoleResolver {
    fn default() -> Self {
        Self::new(Self::default_legacy_mapping(), InternalRole::User)
    }
}

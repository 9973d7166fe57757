//! Identity-provider seam for the client orchestrator.
//!
//! [`IdentityProvider`] is the subset of an MSAL public client the login
//! flow needs. Provider failures are classified once, here, into the
//! handful of outcomes the state machine branches on.

use std::future::Future;

use crate::types::{CacheOptions, MsalConfigResponse};

/// Signed-in provider account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub home_account_id: String,
    pub username: String,
}

/// Provider error codes that mean "retry interactively".
const INTERACTION_REQUIRED_CODES: [&str; 4] = [
    "interaction_required",
    "consent_required",
    "login_required",
    "no_tokens_found",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("interaction required ({0})")]
    InteractionRequired(String),

    /// User closed the popup or cancelled the prompt.
    #[error("user cancelled")]
    UserCancelled,

    #[error("popup blocked")]
    PopupBlocked,

    #[error("{code}: {message}")]
    Other { code: String, message: String },
}

impl ProviderError {
    /// Classify a raw MSAL-style error code.
    pub fn from_code(code: &str, message: impl Into<String>) -> Self {
        let code = code.trim();
        if INTERACTION_REQUIRED_CODES.iter().any(|c| code.contains(c)) {
            return ProviderError::InteractionRequired(code.to_string());
        }
        match code {
            "user_cancelled" | "popup_window_closed" | "user_closed_popup" => {
                ProviderError::UserCancelled
            }
            "popup_window_error" | "empty_window_error" | "popup_blocked" => {
                ProviderError::PopupBlocked
            }
            _ => ProviderError::Other {
                code: code.to_string(),
                message: message.into(),
            },
        }
    }

    pub fn code(&self) -> &str {
        match self {
            ProviderError::InteractionRequired(code) => code,
            ProviderError::UserCancelled => "user_cancelled",
            ProviderError::PopupBlocked => "popup_window_error",
            ProviderError::Other { code, .. } => code,
        }
    }

    pub fn is_interaction_required(&self) -> bool {
        matches!(self, ProviderError::InteractionRequired(_))
    }
}

/// Operations the login flow needs from the identity provider.
///
/// Implementations must be `Send + Sync`; the orchestrator may be shared
/// across tasks.
pub trait IdentityProvider: Send + Sync {
    /// Interactive account selection in a popup.
    fn login_popup(
        &self,
        scopes: &[String],
    ) -> impl Future<Output = Result<Account, ProviderError>> + Send;

    /// Interactive account selection by full-page redirect.
    fn login_redirect(
        &self,
        scopes: &[String],
    ) -> impl Future<Output = Result<Account, ProviderError>> + Send;

    /// Cache-based token acquisition, no UI.
    fn acquire_token_silent(
        &self,
        account: &Account,
        scopes: &[String],
    ) -> impl Future<Output = Result<String, ProviderError>> + Send;

    /// Token acquisition with UI (consent, MFA, re-login).
    fn acquire_token_interactive(
        &self,
        account: &Account,
        scopes: &[String],
    ) -> impl Future<Output = Result<String, ProviderError>> + Send;

    /// End the provider-side session.
    fn logout(
        &self,
        account: Option<&Account>,
    ) -> impl Future<Output = Result<(), ProviderError>> + Send;

    /// Account remembered by the provider's own cache, if any.
    fn active_account(&self) -> Option<Account>;
}

/// Settings used to construct the provider client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    pub client_id: String,
    pub tenant_id: String,
    pub authority_host: String,
    pub redirect_uri: String,
    pub cache: CacheOptions,
}

impl ProviderSettings {
    pub fn authority(&self) -> String {
        format!("{}/{}", self.authority_host.trim_end_matches('/'), self.tenant_id)
    }

    /// Scopes requested when selecting the account.
    pub fn login_scopes(&self) -> Vec<String> {
        ["openid", "profile", "email", "User.Read"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    /// Scope of the HRA API access token sent to the exchange endpoint.
    pub fn api_scopes(&self) -> Vec<String> {
        vec![format!("api://{}/access", self.client_id)]
    }

    /// Overlay the backend's `msal-config` answer on these fallback settings.
    ///
    /// Missing fields keep the fallback; the redirect URI is forced to https.
    pub fn merged_with(&self, remote: MsalConfigResponse) -> Self {
        let pick = |v: Option<String>, fallback: &str| {
            v.filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| fallback.to_string())
        };

        let redirect_uri = pick(remote.redirect_uri, &self.redirect_uri);
        let redirect_uri = match redirect_uri.strip_prefix("http://") {
            Some(rest) => format!("https://{rest}"),
            None if redirect_uri.starts_with("https://") => redirect_uri,
            None => self.redirect_uri.clone(),
        };

        Self {
            client_id: pick(remote.client_id, &self.client_id),
            tenant_id: pick(remote.tenant_id, &self.tenant_id),
            authority_host: self.authority_host.clone(),
            redirect_uri,
            cache: remote.cache.unwrap_or_else(|| self.cache.clone()),
        }
    }
}

//! Client-side auth orchestration.
//!
//! Drives account selection and external token acquisition through an
//! [`IdentityProvider`], exchanges the result for a session credential at
//! the backend, and keeps the signed-in session in a [`CredentialStore`].

mod backend;
mod orchestrator;
mod provider;
mod store;

pub use backend::BackendClient;
pub use orchestrator::{AuthOrchestrator, AuthState, SessionState};
pub use provider::{Account, IdentityProvider, ProviderError, ProviderSettings};
pub use store::{
    CredentialStore, FileCredentialStore, MemoryCredentialStore, StoreError, StoredSession,
    credential_expiry,
};

/// Errors surfaced to the UI layer.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("login cancelled by user")]
    UserCancelled,

    #[error("a login is already in progress")]
    LoginInProgress,

    #[error("not signed in")]
    NotAuthenticated,

    #[error("token exchange failed ({status}): {detail}")]
    ExchangeFailed {
        status: u16,
        code: Option<String>,
        detail: String,
    },

    #[error("backend unreachable: {0}")]
    NetworkUnavailable(String),

    #[error("session expired")]
    SessionExpired,

    #[error("identity provider error {code}: {message}")]
    Provider { code: String, message: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("unexpected backend response: {0}")]
    UnexpectedResponse(String),
}

impl From<ProviderError> for ClientError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::UserCancelled => ClientError::UserCancelled,
            ProviderError::Other { code, message } => ClientError::Provider { code, message },
            other => ClientError::Provider {
                code: other.code().to_string(),
                message: other.to_string(),
            },
        }
    }
}

impl ClientError {
    /// Message shown to the end user.
    pub fn user_message(&self) -> &'static str {
        match self {
            ClientError::UserCancelled => "Inloggning avbröts",
            ClientError::LoginInProgress => "Inloggning pågår redan",
            ClientError::NotAuthenticated => "Du är inte inloggad",
            ClientError::ExchangeFailed { status: 403, .. } => "Behörighet saknas för HRA",
            ClientError::ExchangeFailed { .. } => "Inloggning misslyckades",
            ClientError::NetworkUnavailable(_) => "Kunde inte nå servern",
            ClientError::SessionExpired => "Sessionen har gått ut, logga in igen",
            ClientError::Provider { code, .. } => match code.as_str() {
                "popup_window_error" => "Popup blockeras av webbläsaren",
                c if c.contains("consent_required") || c.contains("interaction_required") => {
                    "Samtycke krävs för Microsoft-inloggning"
                }
                _ => "Microsoft-inloggning misslyckades",
            },
            ClientError::Store(_) => "Kunde inte spara inloggningen",
            ClientError::UnexpectedResponse(_) => "Kunde inte hämta behörighetstoken",
        }
    }
}

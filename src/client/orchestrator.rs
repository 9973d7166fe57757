//! Login state machine.
//!
//! `Unauthenticated -> AccountSelecting -> AcquiringExternalToken ->
//! Exchanging -> Authenticated`. Any step may end in `Error`; a cancelled
//! account selection returns to `Unauthenticated`, as does logout.

use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use super::backend::BackendClient;
use super::provider::{Account, IdentityProvider, ProviderError, ProviderSettings};
use super::store::{CredentialStore, StoreError, StoredSession};
use super::ClientError;
use crate::audit;
use crate::entra::validator::unix_now;
use crate::roles::InternalRole;
use crate::types::{ErrorBody, ExchangeResponse, MeResponse, UserProfile};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    AccountSelecting,
    AcquiringExternalToken,
    Exchanging,
    Authenticated,
    /// Last attempt failed; carries the user-facing message.
    Error(&'static str),
}

/// The signed-in session as the orchestrator sees it.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    session: Option<StoredSession>,
    account: Option<Account>,
}

impl SessionState {
    pub fn token(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.token.as_str())
    }

    pub fn user(&self) -> Option<&UserProfile> {
        self.session.as_ref().map(|s| &s.user)
    }

    pub fn role(&self) -> Option<InternalRole> {
        self.user().map(|u| u.role)
    }

    pub fn expires_at(&self) -> Option<u64> {
        self.session.as_ref().map(|s| s.expires_at)
    }

    pub fn account(&self) -> Option<&Account> {
        self.account.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }
}

/// Resets the in-flight flag when the login attempt ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Code the session middleware sends with its 403.
const INVALID_SESSION_CODE: &str = "invalid_session";

enum Screened {
    Passed(Response),
    SessionRefused,
}

/// A 401, or a 403 carrying [`INVALID_SESSION_CODE`], means the credential
/// itself was refused. Every other answer is handed back unchanged.
async fn screen(resp: Response) -> Result<Screened, ClientError> {
    match resp.status() {
        StatusCode::UNAUTHORIZED => Ok(Screened::SessionRefused),
        StatusCode::FORBIDDEN => {
            let status = resp.status();
            let version = resp.version();
            let headers = resp.headers().clone();
            let body = resp
                .bytes()
                .await
                .map_err(|e| ClientError::NetworkUnavailable(e.to_string()))?;

            let code = serde_json::from_slice::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.code);
            if code.as_deref() == Some(INVALID_SESSION_CODE) {
                return Ok(Screened::SessionRefused);
            }

            let mut rebuilt = axum::http::Response::new(body);
            *rebuilt.status_mut() = status;
            *rebuilt.version_mut() = version;
            *rebuilt.headers_mut() = headers;
            Ok(Screened::Passed(Response::from(rebuilt)))
        }
        _ => Ok(Screened::Passed(resp)),
    }
}

pub struct AuthOrchestrator<P, S> {
    provider: P,
    store: S,
    backend: BackendClient,
    settings: ProviderSettings,
    state: RwLock<AuthState>,
    session: RwLock<SessionState>,
    login_in_flight: AtomicBool,
}

impl<P: IdentityProvider, S: CredentialStore> AuthOrchestrator<P, S> {
    pub fn new(provider: P, store: S, backend: BackendClient, settings: ProviderSettings) -> Self {
        Self {
            provider,
            store,
            backend,
            settings,
            state: RwLock::new(AuthState::Unauthenticated),
            session: RwLock::new(SessionState::default()),
            login_in_flight: AtomicBool::new(false),
        }
    }

    /// Resolve provider settings from the backend (over `fallback`) and
    /// adopt any persisted session.
    pub async fn bootstrap(
        provider: P,
        store: S,
        backend: BackendClient,
        fallback: ProviderSettings,
    ) -> Self {
        let settings = fallback.merged_with(backend.fetch_msal_config().await);
        let orchestrator = Self::new(provider, store, backend, settings);
        orchestrator.restore().await;
        orchestrator
    }

    pub fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn state(&self) -> AuthState {
        self.state.read().await.clone()
    }

    /// Snapshot of the current session.
    pub async fn session(&self) -> SessionState {
        self.session.read().await.clone()
    }

    async fn transition(&self, to: AuthState) {
        let mut state = self.state.write().await;
        if *state != to {
            tracing::debug!(from = ?*state, to = ?to, "auth state transition");
            *state = to;
        }
    }

    /// Adopt a persisted, unexpired session. Expired or unreadable records
    /// are discarded.
    pub async fn restore(&self) -> bool {
        let loaded = match self.store.load().await {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::warn!(error = %e, "discarding unreadable stored session");
                self.discard_stored_or_warn().await;
                None
            }
        };

        match loaded {
            Some(stored) if !stored.is_expired_at(unix_now()) => {
                tracing::debug!(uid = %stored.user.id, "restored stored session");
                *self.session.write().await = SessionState {
                    session: Some(stored),
                    account: self.provider.active_account(),
                };
                self.transition(AuthState::Authenticated).await;
                true
            }
            Some(_) => {
                tracing::debug!("stored session expired, discarding");
                self.discard_stored_or_warn().await;
                false
            }
            None => false,
        }
    }

    /// Run the full interactive login. Only one login may be in flight.
    pub async fn login(&self) -> Result<UserProfile, ClientError> {
        let _in_flight =
            InFlight::acquire(&self.login_in_flight).ok_or(ClientError::LoginInProgress)?;

        match self.run_login().await {
            Ok(stored) => {
                tracing::info!(uid = %stored.user.id, role = %stored.user.role, "signed in");
                self.transition(AuthState::Authenticated).await;
                Ok(stored.user)
            }
            Err(ClientError::UserCancelled) => {
                let idle = if self.session.read().await.is_authenticated() {
                    AuthState::Authenticated
                } else {
                    AuthState::Unauthenticated
                };
                self.transition(idle).await;
                Err(ClientError::UserCancelled)
            }
            Err(e) => {
                tracing::warn!(error = %e, "login failed");
                self.transition(AuthState::Error(e.user_message())).await;
                Err(e)
            }
        }
    }

    async fn run_login(&self) -> Result<StoredSession, ClientError> {
        self.transition(AuthState::AccountSelecting).await;
        let account = self.select_account().await?;

        self.transition(AuthState::AcquiringExternalToken).await;
        let access_token = self.acquire_access_token(&account).await?;

        self.transition(AuthState::Exchanging).await;
        let resp = self.backend.exchange(&access_token).await?;
        self.commit(resp, account).await
    }

    async fn select_account(&self) -> Result<Account, ClientError> {
        let scopes = self.settings.login_scopes();
        match self.provider.login_popup(&scopes).await {
            Ok(account) => Ok(account),
            Err(ProviderError::PopupBlocked) => {
                tracing::info!("popup blocked, falling back to redirect login");
                Ok(self.provider.login_redirect(&scopes).await?)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn acquire_access_token(&self, account: &Account) -> Result<String, ClientError> {
        let scopes = self.settings.api_scopes();
        match self.provider.acquire_token_silent(account, &scopes).await {
            Ok(token) => Ok(token),
            Err(e) if e.is_interaction_required() => {
                tracing::debug!(code = e.code(), "silent acquisition needs interaction");
                Ok(self.provider.acquire_token_interactive(account, &scopes).await?)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Persist first; in-memory state changes only once the store accepted
    /// the whole record.
    async fn commit(
        &self,
        resp: ExchangeResponse,
        account: Account,
    ) -> Result<StoredSession, ClientError> {
        let stored = StoredSession::from_exchange(resp).ok_or_else(|| {
            ClientError::UnexpectedResponse("session credential carries no expiry".into())
        })?;
        self.store.save(&stored).await?;
        *self.session.write().await = SessionState {
            session: Some(stored.clone()),
            account: Some(account),
        };
        Ok(stored)
    }

    /// Sign out locally, then end the provider session on a best-effort basis.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let previous = std::mem::take(&mut *self.session.write().await);
        let cleared = self.discard_stored().await;
        self.transition(AuthState::Unauthenticated).await;

        if let Some(user) = previous.user() {
            audit::session_ended(&user.email, &user.id);
        }

        let account = previous.account.or_else(|| self.provider.active_account());
        if let Err(e) = self.provider.logout(account.as_ref()).await {
            tracing::warn!(error = %e, "provider logout failed, local session already cleared");
        }

        cleared.map_err(ClientError::from)
    }

    /// Call a protected backend route with the session credential.
    ///
    /// A refused credential (401, or 403 `invalid_session`) triggers one
    /// silent re-acquire and re-exchange, after which the call is replayed
    /// once. Other 403s are returned to the caller as they are.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<Response, ClientError> {
        let credential = self.current_credential().await?;
        let resp = self
            .backend
            .send(method.clone(), path, &credential, body)
            .await?;
        if let Screened::Passed(resp) = screen(resp).await? {
            return Ok(resp);
        }

        tracing::debug!(path, "credential refused, refreshing");
        let credential = self.refresh_silently().await?;
        let resp = self.backend.send(method, path, &credential, body).await?;
        match screen(resp).await? {
            Screened::Passed(resp) => Ok(resp),
            Screened::SessionRefused => {
                self.expire_session().await;
                Err(ClientError::SessionExpired)
            }
        }
    }

    /// GET a protected route and decode its JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let resp = self.request(Method::GET, path, None).await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ClientError::UnexpectedResponse(format!(
                "{status} from {path}"
            )));
        }
        resp.json()
            .await
            .map_err(|e| ClientError::UnexpectedResponse(e.to_string()))
    }

    /// Session identity as the backend sees it.
    pub async fn me(&self) -> Result<MeResponse, ClientError> {
        self.get_json("/api/auth/me").await
    }

    async fn current_credential(&self) -> Result<String, ClientError> {
        let stored = self.session.read().await.session.clone();
        match stored {
            None => Err(ClientError::NotAuthenticated),
            Some(stored) if stored.is_expired_at(unix_now()) => self.refresh_silently().await,
            Some(stored) => Ok(stored.token),
        }
    }

    /// Silent-only renewal. Anything short of a fresh credential ends the
    /// session, except an unreachable backend.
    async fn refresh_silently(&self) -> Result<String, ClientError> {
        let account = self.session.read().await.account.clone();
        let Some(account) = account.or_else(|| self.provider.active_account()) else {
            self.expire_session().await;
            return Err(ClientError::SessionExpired);
        };

        match self.reexchange(account).await {
            Ok(stored) => {
                self.transition(AuthState::Authenticated).await;
                Ok(stored.token)
            }
            Err(e @ ClientError::NetworkUnavailable(_)) => {
                self.transition(AuthState::Authenticated).await;
                Err(e)
            }
            Err(e) => {
                tracing::warn!(error = %e, "silent refresh failed");
                self.expire_session().await;
                Err(ClientError::SessionExpired)
            }
        }
    }

    async fn reexchange(&self, account: Account) -> Result<StoredSession, ClientError> {
        self.transition(AuthState::AcquiringExternalToken).await;
        let token = self
            .provider
            .acquire_token_silent(&account, &self.settings.api_scopes())
            .await?;

        self.transition(AuthState::Exchanging).await;
        let resp = self.backend.exchange(&token).await?;
        self.commit(resp, account).await
    }

    async fn expire_session(&self) {
        *self.session.write().await = SessionState::default();
        self.discard_stored_or_warn().await;
        self.transition(AuthState::Error(ClientError::SessionExpired.user_message()))
            .await;
    }

    /// Remove the persisted session. If the store will not clear, overwrite
    /// it with an already-expired record so the next `restore` drops it.
    async fn discard_stored(&self) -> Result<(), StoreError> {
        let Err(e) = self.store.clear().await else {
            return Ok(());
        };
        tracing::warn!(error = %e, "failed to clear stored session, overwriting with expired record");
        self.store.save(&StoredSession::revoked()).await.map_err(|_| e)
    }

    async fn discard_stored_or_warn(&self) {
        if let Err(e) = self.discard_stored().await {
            tracing::warn!(error = %e, "stored session left in place");
        }
    }
}

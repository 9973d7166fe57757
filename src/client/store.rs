//! Client-side persistence of the session credential and user profile.
//!
//! Credential and profile are written as one record so a failed exchange
//! or an interrupted write never leaves half a session behind.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::sync::Mutex;

use crate::roles::InternalRole;
use crate::types::{ExchangeResponse, UserProfile};

/// Everything the client keeps about a signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub token: String,
    pub user: UserProfile,
    /// Credential `exp`, seconds since the epoch.
    pub expires_at: u64,
}

impl StoredSession {
    /// Build from an exchange response. `None` if the credential carries no
    /// readable `exp`.
    pub fn from_exchange(resp: ExchangeResponse) -> Option<Self> {
        let expires_at = credential_expiry(&resp.token)?;
        Some(Self {
            token: resp.token,
            user: resp.user,
            expires_at,
        })
    }

    /// Placeholder record that is already expired.
    pub fn revoked() -> Self {
        Self {
            token: String::new(),
            user: UserProfile {
                role: InternalRole::User,
                name: String::new(),
                email: String::new(),
                id: String::new(),
            },
            expires_at: 0,
        }
    }

    pub fn is_expired_at(&self, now: u64) -> bool {
        now >= self.expires_at
    }
}

/// Read `exp` from a credential without verifying it.
///
/// The client cannot verify the server's signature; this is only used to
/// avoid presenting a credential that is already known to be expired.
pub fn credential_expiry(token: &str) -> Option<u64> {
    #[derive(Deserialize)]
    struct Exp {
        exp: u64,
    }

    let mut parts = token.split('.');
    let (_header, payload, _sig) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    serde_json::from_slice::<Exp>(&bytes).ok().map(|e| e.exp)
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("credential store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored session is unreadable: {0}")]
    Corrupt(String),
}

/// Pluggable persistence for the signed-in session.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> impl Future<Output = Result<Option<StoredSession>, StoreError>> + Send;

    /// Replace the stored session as one unit.
    fn save(&self, session: &StoredSession) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Remove the stored session. Clearing an empty store is not an error.
    fn clear(&self) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Process-local store, for tests and short-lived tools.
#[derive(Default)]
pub struct MemoryCredentialStore {
    inner: Mutex<Option<StoredSession>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    async fn load(&self) -> Result<Option<StoredSession>, StoreError> {
        Ok(self.inner.lock().await.clone())
    }

    async fn save(&self, session: &StoredSession) -> Result<(), StoreError> {
        *self.inner.lock().await = Some(session.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        *self.inner.lock().await = None;
        Ok(())
    }
}

/// JSON file store. Writes go to a sibling temp file and are renamed into
/// place, so readers see either the old record or the new one.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<Option<StoredSession>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| StoreError::Corrupt(e.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, session: &StoredSession) -> Result<(), StoreError> {
        let bytes =
            serde_json::to_vec(session).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

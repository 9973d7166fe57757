//! Provider signing-key cache.
//!
//! Keys are fetched from the tenant's JWKS endpoint and cached per `kid`
//! with a TTL. A fetched document is always cached whole; the entry bound
//! only evicts keys left over from earlier fetches. A lookup for an unknown
//! `kid` triggers one refetch. Concurrent misses may each fetch; the last
//! writer wins, which is harmless because every fetch returns the same set.

use dashmap::DashMap;
use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use std::time::{Duration, Instant};

/// JWKS key entry from the provider's discovery keys document.
#[derive(Debug, Clone, Deserialize)]
pub struct JwkKey {
    pub kid: String,
    pub kty: String,
    #[serde(default)]
    pub n: Option<String>,
    #[serde(default)]
    pub e: Option<String>,
    #[serde(default)]
    pub alg: Option<String>,
    #[serde(rename = "use", default)]
    pub key_use: Option<String>,
}

/// JWKS response body.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksResponse {
    pub keys: Vec<JwkKey>,
}

#[derive(Clone)]
struct CachedKey {
    key: DecodingKey,
    fetched_at: Instant,
}

/// Cached RSA verification keys indexed by key id.
pub struct SigningKeySet {
    jwks_url: String,
    keys: DashMap<String, CachedKey>,
    ttl: Duration,
    max_entries: usize,
    http_client: reqwest::Client,
}

impl SigningKeySet {
    pub fn new(
        http_client: reqwest::Client,
        jwks_url: impl Into<String>,
        ttl: Duration,
        max_entries: usize,
    ) -> Self {
        Self {
            jwks_url: jwks_url.into(),
            keys: DashMap::new(),
            ttl,
            max_entries: max_entries.max(1),
            http_client,
        }
    }

    /// Return the verification key for `kid`, fetching at most once.
    ///
    /// `Ok(None)` means the provider does not publish that key id.
    pub async fn get(&self, kid: &str) -> Result<Option<DecodingKey>, KeySetError> {
        if let Some(key) = self.cached(kid) {
            return Ok(Some(key));
        }
        tracing::debug!(kid, "signing key not cached, fetching JWKS");
        self.refresh().await?;
        Ok(self.cached(kid))
    }

    fn cached(&self, kid: &str) -> Option<DecodingKey> {
        let entry = self.keys.get(kid)?;
        if entry.fetched_at.elapsed() < self.ttl {
            return Some(entry.key.clone());
        }
        drop(entry); // Release the read guard before removing
        self.keys.remove(kid);
        None
    }

    /// Fetch the provider key set and merge it into the cache.
    pub async fn refresh(&self) -> Result<usize, KeySetError> {
        let resp = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| KeySetError::FetchFailed(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(KeySetError::FetchFailed(format!("HTTP {}", resp.status())));
        }

        let jwks: JwksResponse = resp
            .json()
            .await
            .map_err(|e| KeySetError::FetchFailed(e.to_string()))?;

        let now = Instant::now();
        let mut loaded = 0;
        for jwk in jwks.keys.iter().filter(|k| is_rsa_signing_key(k)) {
            let (Some(n), Some(e)) = (jwk.n.as_deref(), jwk.e.as_deref()) else {
                continue;
            };
            match DecodingKey::from_rsa_components(n, e) {
                Ok(key) => {
                    self.keys
                        .insert(jwk.kid.clone(), CachedKey { key, fetched_at: now });
                    loaded += 1;
                }
                Err(err) => tracing::warn!(kid = %jwk.kid, %err, "skipping unusable JWKS key"),
            }
        }
        self.evict_stale(now);

        tracing::debug!(loaded, cached = self.keys.len(), "JWKS refreshed");
        Ok(loaded)
    }

    /// Drop oldest entries from earlier fetches while over the bound. Keys
    /// from the fetch at `current` are never evicted.
    fn evict_stale(&self, current: Instant) {
        while self.keys.len() > self.max_entries {
            let oldest = self
                .keys
                .iter()
                .filter(|e| e.value().fetched_at < current)
                .min_by_key(|e| e.value().fetched_at)
                .map(|e| e.key().clone());
            match oldest {
                Some(old) => {
                    self.keys.remove(&old);
                }
                None => break,
            }
        }
    }

    /// Number of cached keys, expired ones included.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

fn is_rsa_signing_key(jwk: &JwkKey) -> bool {
    jwk.kty == "RSA"
        && jwk.key_use.as_deref().is_none_or(|u| u == "sig")
        && jwk.alg.as_deref().is_none_or(|a| a == "RS256")
}

#[derive(Debug, thiserror::Error)]
pub enum KeySetError {
    #[error("JWKS fetch failed: {0}")]
    FetchFailed(String),
}

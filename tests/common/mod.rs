//! Test utilities: RSA keypair, Entra-style token factory, test app builder,
//! scripted identity provider.

#![allow(dead_code)]

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hra_token_exchange::client::{Account, IdentityProvider, ProviderError};
use hra_token_exchange::config::Config;
use hra_token_exchange::{AppState, create_app};
use rsa::RsaPrivateKey;
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::traits::PublicKeyParts;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Notify;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TENANT: &str = "11111111-2222-3333-4444-555555555555";
pub const CLIENT_ID: &str = "test-client-id";

pub fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// Test RSA keypair for signing provider access tokens.
pub struct TestKeys {
    pub private_key: RsaPrivateKey,
    pub kid: String,
}

impl TestKeys {
    pub fn generate() -> Self {
        Self::with_kid("test-key-1")
    }

    pub fn with_kid(kid: &str) -> Self {
        let mut rng = rsa::rand_core::OsRng;
        let private_key = RsaPrivateKey::new(&mut rng, 2048).expect("failed to generate key");
        Self {
            private_key,
            kid: kid.into(),
        }
    }

    /// RS256-sign `claims` with this key's kid in the header.
    pub fn sign_jwt(&self, claims: &serde_json::Value) -> String {
        let der = self
            .private_key
            .to_pkcs1_der()
            .expect("failed to encode private key");
        let encoding_key = jsonwebtoken::EncodingKey::from_rsa_der(der.as_bytes());

        let mut header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256);
        header.kid = Some(self.kid.clone());

        jsonwebtoken::encode(&header, claims, &encoding_key).expect("failed to sign JWT")
    }

    /// JWK entry for this key.
    pub fn jwk(&self) -> serde_json::Value {
        let public_key = self.private_key.to_public_key();
        json!({
            "kid": self.kid,
            "kty": "RSA",
            "alg": "RS256",
            "use": "sig",
            "n": URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be()),
            "e": URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be())
        })
    }

    /// JWKS document for wiremock.
    pub fn jwks_json(&self) -> serde_json::Value {
        json!({ "keys": [self.jwk()] })
    }
}

/// HS256-sign `claims` with a kid header, the shape of an algorithm-swap attempt.
pub fn sign_hs256(claims: &serde_json::Value, kid: &str, secret: &[u8]) -> String {
    let mut header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256);
    header.kid = Some(kid.into());
    jsonwebtoken::encode(
        &header,
        claims,
        &jsonwebtoken::EncodingKey::from_secret(secret),
    )
    .expect("failed to sign JWT")
}

/// v2.0 issuer for a provider mocked at `authority_host`.
pub fn issuer(authority_host: &str) -> String {
    format!("{authority_host}/{TENANT}/v2.0")
}

/// Claims of a valid Entra access token with scope `access` and `roles`.
pub fn test_claims(authority_host: &str, oid: &str, email: &str, roles: &[&str]) -> serde_json::Value {
    let now = now();
    json!({
        "aud": format!("api://{CLIENT_ID}"),
        "iss": issuer(authority_host),
        "tid": TENANT,
        "oid": oid,
        "sub": format!("sub-{oid}"),
        "name": "Test User",
        "preferred_username": email,
        "scp": "access",
        "roles": roles,
        "iat": now - 60,
        "nbf": now - 60,
        "exp": now + 3600
    })
}

/// Config pointing the provider authority at a wiremock server.
pub fn test_config(authority_host: &str) -> Config {
    let mut config = Config::test_default();
    config.authority_host = authority_host.to_string();
    config
}

/// Mount the tenant JWKS endpoint on `server`.
pub async fn mount_jwks(server: &MockServer, jwks: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/{TENANT}/discovery/v2.0/keys")))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwks))
        .mount(server)
        .await;
}

pub fn build_test_app_with_config(config: Config) -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(config).expect("failed to build app state"));
    let app = create_app(state.clone());
    (app, state)
}

/// Provider at a wiremock server publishing `keys`' JWKS, plus an app trusting it.
pub async fn provider_and_app(keys: &TestKeys) -> (MockServer, axum::Router, Arc<AppState>) {
    let provider = MockServer::start().await;
    mount_jwks(&provider, keys.jwks_json()).await;
    let (app, state) = build_test_app_with_config(test_config(&provider.uri()));
    (provider, app, state)
}

/// Serve `app` on an ephemeral local port; returns its base URL.
pub async fn serve(app: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind");
    let addr = listener.local_addr().expect("no local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server failed");
    });
    format!("http://{addr}")
}

/// Identity provider with scripted answers. Unscripted calls succeed with
/// `account()` and the configured access token.
#[derive(Default)]
pub struct ScriptedProvider {
    pub access_token: Mutex<String>,
    pub popup: Mutex<VecDeque<Result<Account, ProviderError>>>,
    pub silent: Mutex<VecDeque<Result<String, ProviderError>>>,
    pub interactive: Mutex<VecDeque<Result<String, ProviderError>>>,
    pub logout_result: Mutex<Option<ProviderError>>,
    /// When set, `login_popup` waits for a notification before answering.
    pub popup_gate: Option<Arc<Notify>>,
    /// When set, `acquire_token_silent` waits for a notification first.
    pub silent_gate: Mutex<Option<Arc<Notify>>>,
    pub remembered: Mutex<Option<Account>>,

    pub popup_calls: AtomicUsize,
    pub redirect_calls: AtomicUsize,
    pub silent_calls: AtomicUsize,
    pub interactive_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn with_token(token: impl Into<String>) -> Self {
        let provider = Self::default();
        *provider.access_token.lock().unwrap() = token.into();
        provider
    }

    pub fn set_token(&self, token: impl Into<String>) {
        *self.access_token.lock().unwrap() = token.into();
    }

    pub fn script_popup(&self, result: Result<Account, ProviderError>) {
        self.popup.lock().unwrap().push_back(result);
    }

    pub fn script_silent(&self, result: Result<String, ProviderError>) {
        self.silent.lock().unwrap().push_back(result);
    }

    pub fn script_interactive(&self, result: Result<String, ProviderError>) {
        self.interactive.lock().unwrap().push_back(result);
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn token(&self) -> String {
        self.access_token.lock().unwrap().clone()
    }
}

pub fn account() -> Account {
    Account {
        home_account_id: format!("oid-1.{TENANT}"),
        username: "anna@example.com".into(),
    }
}

impl IdentityProvider for ScriptedProvider {
    async fn login_popup(&self, _scopes: &[String]) -> Result<Account, ProviderError> {
        self.popup_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.popup_gate {
            gate.notified().await;
        }
        let scripted = self.popup.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(account()))
    }

    async fn login_redirect(&self, _scopes: &[String]) -> Result<Account, ProviderError> {
        self.redirect_calls.fetch_add(1, Ordering::SeqCst);
        Ok(account())
    }

    async fn acquire_token_silent(
        &self,
        _account: &Account,
        _scopes: &[String],
    ) -> Result<String, ProviderError> {
        self.silent_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.silent_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let scripted = self.silent.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(self.token()))
    }

    async fn acquire_token_interactive(
        &self,
        _account: &Account,
        _scopes: &[String],
    ) -> Result<String, ProviderError> {
        self.interactive_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.interactive.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(self.token()))
    }

    async fn logout(&self, _account: Option<&Account>) -> Result<(), ProviderError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        match self.logout_result.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn active_account(&self) -> Option<Account> {
        self.remembered.lock().unwrap().clone()
    }
}

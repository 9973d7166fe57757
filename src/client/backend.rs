//! HTTP client for the token-exchange backend.

use reqwest::{Method, Response, StatusCode};
use std::time::Duration;

use super::ClientError;
use crate::types::{ErrorBody, ExchangeRequest, ExchangeResponse, MsalConfigResponse};

const EXCHANGE_PATH: &str = "/api/auth/msal-exchange";
const MSAL_CONFIG_PATH: &str = "/api/auth/msal-config";

#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::NetworkUnavailable(e.to_string()))?;
        Ok(Self::with_http_client(http, base_url))
    }

    pub fn with_http_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Provider settings published by the backend. Any failure yields an
    /// empty answer so callers fall back to built-in settings.
    pub async fn fetch_msal_config(&self) -> MsalConfigResponse {
        let resp = match self.http.get(self.url(MSAL_CONFIG_PATH)).send().await {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => {
                tracing::warn!(status = %resp.status(), "msal-config unavailable, using fallback");
                return MsalConfigResponse::default();
            }
            Err(e) => {
                tracing::warn!(error = %e, "msal-config unreachable, using fallback");
                return MsalConfigResponse::default();
            }
        };
        resp.json().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "msal-config unreadable, using fallback");
            MsalConfigResponse::default()
        })
    }

    /// Trade an external access token for a session credential.
    pub async fn exchange(&self, access_token: &str) -> Result<ExchangeResponse, ClientError> {
        let resp = self
            .http
            .post(self.url(EXCHANGE_PATH))
            .json(&ExchangeRequest {
                access_token: access_token.to_string(),
            })
            .send()
            .await
            .map_err(|e| ClientError::NetworkUnavailable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(exchange_failure(status, resp).await);
        }

        resp.json()
            .await
            .map_err(|e| ClientError::UnexpectedResponse(e.to_string()))
    }

    /// Call a protected route with the session credential.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        credential: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<Response, ClientError> {
        let mut req = self
            .http
            .request(method, self.url(path))
            .bearer_auth(credential);
        if let Some(body) = body {
            req = req.json(body);
        }
        req.send()
            .await
            .map_err(|e| ClientError::NetworkUnavailable(e.to_string()))
    }
}

async fn exchange_failure(status: StatusCode, resp: Response) -> ClientError {
    let text = resp.text().await.unwrap_or_default();
    let (code, detail) = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) if !body.error.is_empty() => (body.code, body.error),
        _ if !text.trim().is_empty() => (None, text),
        _ => (None, status.canonical_reason().unwrap_or("error").to_string()),
    };
    ClientError::ExchangeFailed {
        status: status.as_u16(),
        code,
        detail,
    }
}

//! Shared request/response DTOs.
//!
//! Field names follow the browser client's camelCase wire format. The same
//! types are used by the server routes and by [`crate::client`].

use serde::{Deserialize, Serialize};

use crate::roles::InternalRole;

/// POST /api/auth/msal-exchange request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRequest {
    #[serde(default)]
    pub access_token: String,
}

/// User profile returned alongside the session credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub role: InternalRole,
    pub name: String,
    pub email: String,
    pub id: String,
}

/// POST /api/auth/msal-exchange response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeResponse {
    pub token: String,
    pub user: UserProfile,
}

/// Token cache settings handed to the browser MSAL client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheOptions {
    pub cache_location: String,
    pub store_auth_state_in_cookie: bool,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            cache_location: "sessionStorage".into(),
            store_auth_state_in_cookie: false,
        }
    }
}

/// GET /api/auth/msal-config response. Every field may be absent when read
/// by a client talking to an older backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MsalConfigResponse {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub redirect_uri: Option<String>,
    #[serde(default)]
    pub cache: Option<CacheOptions>,
}

/// GET /api/auth/me response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: InternalRole,
    pub can_approve: bool,
    pub expires_at: u64,
}

/// GET /health response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub mode: String,
}

/// Error body returned by every failing route.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub field: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exchange_request_camel_case() {
        let req: ExchangeRequest = serde_json::from_str(r#"{"accessToken": "at-1"}"#).unwrap();
        assert_eq!(req.access_token, "at-1");
    }

    #[test]
    fn test_exchange_request_missing_token_defaults_empty() {
        let req: ExchangeRequest = serde_json::from_str("{}").unwrap();
        assert!(req.access_token.is_empty());
    }

    #[test]
    fn test_exchange_response_shape() {
        let resp = ExchangeResponse {
            token: "t".into(),
            user: UserProfile {
                role: InternalRole::Supervisor,
                name: "N".into(),
                email: "e@example.com".into(),
                id: "oid".into(),
            },
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["token"], "t");
        assert_eq!(json["user"]["role"], "supervisor");
        assert_eq!(json["user"]["id"], "oid");
    }

    #[test]
    fn test_msal_config_serialization() {
        let resp = MsalConfigResponse {
            client_id: Some("cid".into()),
            tenant_id: Some("tid".into()),
            redirect_uri: Some("https://app/auth/callback".into()),
            cache: Some(CacheOptions::default()),
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["clientId"], "cid");
        assert_eq!(json["redirectUri"], "https://app/auth/callback");
        assert_eq!(json["cache"]["cacheLocation"], "sessionStorage");
        assert_eq!(json["cache"]["storeAuthStateInCookie"], false);
    }

    #[test]
    fn test_msal_config_partial_deserialization() {
        let resp: MsalConfigResponse = serde_json::from_str(r#"{"clientId": "cid"}"#).unwrap();
        assert_eq!(resp.client_id.as_deref(), Some("cid"));
        assert!(resp.tenant_id.is_none());
        assert!(resp.cache.is_none());
    }

    #[test]
    fn test_error_body_tolerates_plain_error() {
        let body: ErrorBody = serde_json::from_str(r#"{"error": "nope"}"#).unwrap();
        assert_eq!(body.error, "nope");
        assert!(body.code.is_none());
    }
}

//! OCSF (Open Cybersecurity Schema Framework) audit events.
//!
//! Authentication outcomes are emitted as OCSF Authentication (3001)
//! records via `tracing::info!` on the `ocsf` target. Never panics.

use serde_json::json;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::roles::InternalRole;

pub const CLASS_AUTHENTICATION: u32 = 3001;

// Activity IDs
pub const ACTIVITY_LOGON: u32 = 1;
pub const ACTIVITY_LOGOFF: u32 = 2;
pub const ACTIVITY_AUTH_TICKET: u32 = 3; // Token exchange
pub const ACTIVITY_OTHER: u32 = 99; // Session checks

// Status IDs
pub const STATUS_SUCCESS: u32 = 1;
pub const STATUS_FAILURE: u32 = 2;

// Severity IDs
pub const SEVERITY_INFORMATIONAL: u32 = 1;
pub const SEVERITY_LOW: u32 = 2;
pub const SEVERITY_MEDIUM: u32 = 3;
pub const SEVERITY_HIGH: u32 = 4;

pub const AUTH_PROTOCOL_OAUTH2: u32 = 10;
const AUTH_PROTOCOL_OAUTH2_NAME: &str = "OAuth 2.0/OIDC";

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn severity_name(id: u32) -> &'static str {
    match id {
        SEVERITY_INFORMATIONAL => "Informational",
        SEVERITY_LOW => "Low",
        SEVERITY_MEDIUM => "Medium",
        SEVERITY_HIGH => "High",
        _ => "Unknown",
    }
}

fn status_name(id: u32) -> &'static str {
    match id {
        STATUS_SUCCESS => "Success",
        _ => "Failure",
    }
}

/// Actor fields known at the time of the event.
#[derive(Debug, Default, Clone, Copy)]
pub struct Actor<'a> {
    pub email: Option<&'a str>,
    pub uid: Option<&'a str>,
}

/// Build an OCSF Authentication (3001) record.
pub fn authentication_record(
    activity_id: u32,
    activity_name: &str,
    status_id: u32,
    severity_id: u32,
    actor: Actor<'_>,
    message: &str,
) -> serde_json::Value {
    let mut event = json!({
        "class_uid": CLASS_AUTHENTICATION,
        "class_name": "Authentication",
        "activity_id": activity_id,
        "activity_name": activity_name,
        "severity_id": severity_id,
        "severity": severity_name(severity_id),
        "status_id": status_id,
        "status": status_name(status_id),
        "time": now_millis(),
        "metadata": {
            "product": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
                "vendor_name": "HRA"
            }
        },
        "auth_protocol_id": AUTH_PROTOCOL_OAUTH2,
        "auth_protocol": AUTH_PROTOCOL_OAUTH2_NAME,
        "message": message,
    });

    if actor.email.is_some() || actor.uid.is_some() {
        event["actor"] = json!({
            "user": {
                "email_addr": actor.email,
                "uid": actor.uid,
                "type_id": 1,
                "type": "User"
            }
        });
    }

    event
}

fn emit(event: &serde_json::Value) {
    if let Ok(json) = serde_json::to_string(event) {
        tracing::info!(target: "ocsf", "{}", json);
    }
}

/// External token exchanged for a session credential.
pub fn exchange_succeeded(email: &str, uid: &str, role: InternalRole) {
    emit(&authentication_record(
        ACTIVITY_AUTH_TICKET,
        "Authentication Ticket",
        STATUS_SUCCESS,
        SEVERITY_INFORMATIONAL,
        Actor {
            email: Some(email),
            uid: Some(uid),
        },
        &format!("Token exchange succeeded, role {role}"),
    ));
}

/// External token rejected at the exchange endpoint.
pub fn exchange_failed(code: &str) {
    let severity = match code {
        "bad_signature" | "disallowed_algorithm" => SEVERITY_HIGH,
        "key_set_unavailable" => SEVERITY_LOW,
        _ => SEVERITY_MEDIUM,
    };
    emit(&authentication_record(
        ACTIVITY_AUTH_TICKET,
        "Authentication Ticket",
        STATUS_FAILURE,
        severity,
        Actor::default(),
        &format!("Token exchange failed: {code}"),
    ));
}

/// Session credential refused by the middleware.
pub fn session_rejected(path: &str, reason: &str) {
    emit(&authentication_record(
        ACTIVITY_OTHER,
        "Other",
        STATUS_FAILURE,
        SEVERITY_LOW,
        Actor::default(),
        &format!("Session rejected on {path}: {reason}"),
    ));
}

/// Session credential presented to the introspection route.
pub fn session_observed(email: &str, uid: &str) {
    emit(&authentication_record(
        ACTIVITY_LOGON,
        "Logon",
        STATUS_SUCCESS,
        SEVERITY_INFORMATIONAL,
        Actor {
            email: Some(email),
            uid: Some(uid),
        },
        "Session credential presented",
    ));
}

/// Client signed out; local session material discarded.
pub fn session_ended(email: &str, uid: &str) {
    emit(&authentication_record(
        ACTIVITY_LOGOFF,
        "Logoff",
        STATUS_SUCCESS,
        SEVERITY_INFORMATIONAL,
        Actor {
            email: Some(email),
            uid: Some(uid),
        },
        "Session ended by user",
    ));
}

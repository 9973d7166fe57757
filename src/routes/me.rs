//! GET /api/auth/me

use axum::Json;

use crate::audit;
use crate::session::SessionIdentity;
use crate::types::MeResponse;

/// Return the identity carried by the caller's session credential.
pub async fn me(identity: SessionIdentity) -> Json<MeResponse> {
    audit::session_observed(&identity.email, &identity.uid);

    Json(MeResponse {
        id: identity.uid.clone(),
        email: identity.email.clone(),
        name: identity.name.clone(),
        role: identity.role,
        can_approve: identity.role.can_approve(),
        expires_at: identity.exp,
    })
}

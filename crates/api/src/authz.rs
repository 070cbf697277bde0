//! API-side authorization guard.
//!
//! Handlers call `require` before touching a service; services themselves
//! stay auth-agnostic apart from ownership checks.

use axum::http::StatusCode;
use axum::response::Response;

use orderkit_auth::{Permission, Principal, authorize};

use crate::app::errors::json_error;
use crate::context::PrincipalContext;

/// Check that the request principal holds `permission`.
pub fn require(principal: &PrincipalContext, permission: &Permission) -> Result<(), Response> {
    let principal = Principal::from_roles(principal.user_id(), principal.roles().to_vec());
    authorize(&principal, permission)
        .map_err(|e| json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string()))
}

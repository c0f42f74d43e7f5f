// handlers/mod.rs - Two-tier handler layout
//
// Public (no session) → Protected (JWT + validated ACTIVE user)
//
// Authorization inside the protected tier is per handler: permission
// containment via `ValidatedUser::require`, admin-only routes via
// `ValidatedUser::require_admin`, and data-scope filtering via
// `ValidatedUser::scope`.
pub mod protected; // /api/* except the webhook receiver
pub mod public; // /, /health, /api/webhooks/weclapp, /auth/invitations/*

use uuid::Uuid;

use crate::error::ApiError;

/// Path ids are parsed by hand so malformed ids get the JSON error envelope
pub(crate) fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::bad_request(format!("'{}' is not a valid id", raw)))
}

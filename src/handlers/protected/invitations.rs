use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;

use crate::database::models::{Invitation, InvitationStatus};
use crate::error::ApiError;
use crate::handlers::parse_id;
use crate::middleware::{ApiResponse, ApiResult, ValidatedUser};
use crate::permissions::INVITATIONS_MANAGE;
use crate::services::invitation_service::{self, CreateInvitation, IssuedInvitation};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct InvitationQuery {
    pub status: Option<String>,
}

/// GET /api/invitations[?status=PENDING]
pub async fn list(
    State(state): State<AppState>,
    Extension(caller): Extension<ValidatedUser>,
    Query(query): Query<InvitationQuery>,
) -> ApiResult<Vec<Invitation>> {
    caller.require(INVITATIONS_MANAGE)?;
    let status = match query.status.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(
            InvitationStatus::parse(raw)
                .ok_or_else(|| ApiError::field_error("status", "must be PENDING, ACCEPTED, REVOKED or EXPIRED"))?,
        ),
    };
    Ok(ApiResponse::success(invitation_service::list(&state.pool, status).await?))
}

/// POST /api/invitations - Invite by email
///
/// The raw token and accept URL are only returned here and on resend.
pub async fn create(
    State(state): State<AppState>,
    Extension(caller): Extension<ValidatedUser>,
    Json(input): Json<CreateInvitation>,
) -> ApiResult<IssuedInvitation> {
    caller.require(INVITATIONS_MANAGE)?;
    let issued = invitation_service::create(&state.pool, &state.config, &caller.role, Some(caller.user.id), input).await?;
    Ok(ApiResponse::created(issued))
}

/// POST /api/invitations/:id/resend - Fresh token and expiry
pub async fn resend(
    State(state): State<AppState>,
    Extension(caller): Extension<ValidatedUser>,
    Path(id): Path<String>,
) -> ApiResult<IssuedInvitation> {
    caller.require(INVITATIONS_MANAGE)?;
    let issued = invitation_service::resend(&state.pool, &state.config, &caller.role, parse_id(&id)?).await?;
    Ok(ApiResponse::success(issued))
}

/// DELETE /api/invitations/:id - Revoke and drop the provisional user
pub async fn revoke(
    State(state): State<AppState>,
    Extension(caller): Extension<ValidatedUser>,
    Path(id): Path<String>,
) -> ApiResult<Invitation> {
    caller.require(INVITATIONS_MANAGE)?;
    let revoked = invitation_service::revoke(&state.pool, parse_id(&id)?).await?;
    Ok(ApiResponse::success(revoked))
}

use axum::{
    extract::{Path, State},
    Json,
};

use crate::middleware::{ApiResponse, ApiResult};
use crate::services::invitation_service::{self, AcceptInvitation, AcceptedInvitation, InvitationPreview};
use crate::state::AppState;

/// GET /auth/invitations/:token - What the invitee is about to accept
pub async fn preview(State(state): State<AppState>, Path(token): Path<String>) -> ApiResult<InvitationPreview> {
    let preview = invitation_service::preview(&state.pool, &token).await?;
    Ok(ApiResponse::success(preview))
}

/// POST /auth/invitations/:token/accept - Activate the account and start a session
///
/// Body is optional: `{"name": "Ada Lovelace"}`.
pub async fn accept(
    State(state): State<AppState>,
    Path(token): Path<String>,
    body: Option<Json<AcceptInvitation>>,
) -> ApiResult<AcceptedInvitation> {
    let input = body.map(|Json(input)| input).unwrap_or_default();
    let accepted = invitation_service::accept(&state.pool, &state.config, &token, input).await?;
    Ok(ApiResponse::success(accepted))
}

use axum::Extension;
use serde::Serialize;

use crate::database::models::User;
use crate::middleware::{ApiResponse, ApiResult, ValidatedUser};
use crate::permissions::ResolvedRole;

#[derive(Debug, Serialize)]
pub struct Me {
    pub user: User,
    pub role: ResolvedRole,
    pub is_admin: bool,
}

/// GET /api/me - The session's user with resolved permissions and scopes
pub async fn get(Extension(caller): Extension<ValidatedUser>) -> ApiResult<Me> {
    let is_admin = caller.is_admin();
    Ok(ApiResponse::success(Me {
        user: caller.user,
        role: caller.role,
        is_admin,
    }))
}

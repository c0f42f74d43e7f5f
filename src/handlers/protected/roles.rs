use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde_json::{json, Value};

use crate::middleware::{ApiResponse, ApiResult, ValidatedUser};
use crate::permissions::{ResolvedRole, USERS_READ};
use crate::services::role_service::{self, CreateRole, RoleSummary, UpdateRole};
use crate::state::AppState;

/// GET /api/roles - System roles, then custom roles, each with its user count
pub async fn list(
    State(state): State<AppState>,
    Extension(caller): Extension<ValidatedUser>,
) -> ApiResult<Vec<RoleSummary>> {
    caller.require(USERS_READ)?;
    Ok(ApiResponse::success(role_service::list(&state.pool).await?))
}

/// GET /api/roles/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(caller): Extension<ValidatedUser>,
    Path(id): Path<String>,
) -> ApiResult<RoleSummary> {
    caller.require(USERS_READ)?;
    Ok(ApiResponse::success(role_service::get(&state.pool, &id).await?))
}

/// POST /api/roles - Custom role (admin only)
///
/// ```json
/// {"id": "sales", "name": "Sales", "permissions": ["orders:read"], "scopes": {"orders": "own"}}
/// ```
pub async fn create(
    State(state): State<AppState>,
    Extension(caller): Extension<ValidatedUser>,
    Json(input): Json<CreateRole>,
) -> ApiResult<ResolvedRole> {
    caller.require_admin()?;
    Ok(ApiResponse::created(role_service::create(&state.pool, input).await?))
}

/// PATCH /api/roles/:id - Custom roles only; `scopes` replaces the whole map
pub async fn update(
    State(state): State<AppState>,
    Extension(caller): Extension<ValidatedUser>,
    Path(id): Path<String>,
    Json(input): Json<UpdateRole>,
) -> ApiResult<ResolvedRole> {
    caller.require_admin()?;
    Ok(ApiResponse::success(role_service::update(&state.pool, &id, input).await?))
}

/// DELETE /api/roles/:id - Refused while any user holds the role
pub async fn delete(
    State(state): State<AppState>,
    Extension(caller): Extension<ValidatedUser>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    caller.require_admin()?;
    role_service::delete(&state.pool, &id).await?;
    Ok(ApiResponse::success(json!({ "id": id, "deleted": true })))
}

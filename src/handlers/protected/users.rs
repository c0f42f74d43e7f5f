use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;

use super::fetch_page;
use crate::api::{eq_filter, ListQuery};
use crate::database::models::{ErpUser, User, USERS};
use crate::handlers::parse_id;
use crate::middleware::{ApiResponse, ApiResult, Page, ValidatedUser};
use crate::permissions::{USERS_MANAGE, USERS_READ};
use crate::services::user_service::{self, PromoteErpUser, UpdateUser};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct UserFilters {
    pub role_id: Option<String>,
    pub department: Option<String>,
}

/// GET /api/users - Application users; `status` is PENDING, ACTIVE or INACTIVE
pub async fn list(
    State(state): State<AppState>,
    Extension(caller): Extension<ValidatedUser>,
    Query(query): Query<ListQuery>,
    Query(filters): Query<UserFilters>,
) -> ApiResult<Page<User>> {
    caller.require(USERS_READ)?;
    let extra = [
        eq_filter("role_id", filters.role_id),
        eq_filter("department", filters.department),
    ]
    .into_iter()
    .flatten()
    .collect();
    let mut query = query;
    query.status = query.status.map(|s| s.to_ascii_uppercase());

    let filter = query.to_filter(&USERS, Some("created_at"), extra, None, &state.config.api)?;
    Ok(ApiResponse::success(fetch_page(&state.pool, &USERS, filter).await?))
}

/// GET /api/users/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(caller): Extension<ValidatedUser>,
    Path(id): Path<String>,
) -> ApiResult<User> {
    caller.require(USERS_READ)?;
    let user = user_service::get(&state.pool, parse_id(&id)?).await?;
    Ok(ApiResponse::success(user))
}

/// PATCH /api/users/:id - Name, role, department, WeClapp link, status
///
/// `null` clears an optional field; an absent field is left alone.
pub async fn update(
    State(state): State<AppState>,
    Extension(caller): Extension<ValidatedUser>,
    Path(id): Path<String>,
    Json(input): Json<UpdateUser>,
) -> ApiResult<User> {
    caller.require(USERS_MANAGE)?;
    let user = user_service::update(&state.pool, &caller.user, &caller.role, parse_id(&id)?, input).await?;
    Ok(ApiResponse::success(user))
}

/// DELETE /api/users/:id - Deactivate; rows are never removed
pub async fn deactivate(
    State(state): State<AppState>,
    Extension(caller): Extension<ValidatedUser>,
    Path(id): Path<String>,
) -> ApiResult<User> {
    caller.require(USERS_MANAGE)?;
    let user = user_service::deactivate(&state.pool, &caller.user, &caller.role, parse_id(&id)?).await?;
    Ok(ApiResponse::success(user))
}

/// GET /api/users/erp-candidates - Cached WeClapp users without an account
pub async fn erp_candidates(
    State(state): State<AppState>,
    Extension(caller): Extension<ValidatedUser>,
) -> ApiResult<Vec<ErpUser>> {
    caller.require(USERS_MANAGE)?;
    Ok(ApiResponse::success(user_service::erp_candidates(&state.pool).await?))
}

/// POST /api/users/from-erp/:weclapp_id - Create an active user from an ERP user
pub async fn promote_from_erp(
    State(state): State<AppState>,
    Extension(caller): Extension<ValidatedUser>,
    Path(weclapp_id): Path<String>,
    body: Option<Json<PromoteErpUser>>,
) -> ApiResult<User> {
    caller.require(USERS_MANAGE)?;
    let input = body.map(|Json(input)| input).unwrap_or_default();
    let user = user_service::promote_from_erp(&state.pool, &caller.role, &weclapp_id, input).await?;
    Ok(ApiResponse::created(user))
}

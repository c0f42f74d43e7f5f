use axum::{extract::State, Extension};

use crate::middleware::{ApiResponse, ApiResult, ValidatedUser};
use crate::permissions::DASHBOARD_VIEW;
use crate::services::dashboard_service::{self, DashboardStats};
use crate::state::AppState;

/// GET /api/dashboard/stats - Landing page counters within the caller's scopes
pub async fn stats(
    State(state): State<AppState>,
    Extension(caller): Extension<ValidatedUser>,
) -> ApiResult<DashboardStats> {
    caller.require(DASHBOARD_VIEW)?;
    let stats = dashboard_service::stats(&state.pool, &caller.user, &caller.role).await?;
    Ok(ApiResponse::success(stats))
}

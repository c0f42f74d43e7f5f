use axum::{
    extract::{Path, State},
    Extension,
};

use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, ValidatedUser};
use crate::permissions::SYNC_RUN;
use crate::services::sync_service::{self, SyncEntity, SyncReport, SyncService, SyncStatus};
use crate::state::AppState;

/// POST /api/sync - Full pull of every entity type, users first (admin only)
pub async fn sync_all(
    State(state): State<AppState>,
    Extension(caller): Extension<ValidatedUser>,
) -> ApiResult<Vec<SyncReport>> {
    caller.require_admin()?;
    tracing::info!("Full sync requested by {}", caller.user.email);
    let reports = SyncService::new(&state.pool, &state.weclapp).sync_all().await?;
    Ok(ApiResponse::success(reports))
}

/// POST /api/sync/:entity - users, tasks, orders, parties or time-entries (admin only)
pub async fn sync_entity(
    State(state): State<AppState>,
    Extension(caller): Extension<ValidatedUser>,
    Path(entity): Path<String>,
) -> ApiResult<SyncReport> {
    caller.require_admin()?;
    let entity = SyncEntity::parse(&entity)
        .ok_or_else(|| ApiError::not_found(format!("Unknown sync entity '{}'", entity)))?;
    tracing::info!("Sync of {} requested by {}", entity.as_str(), caller.user.email);
    let report = SyncService::new(&state.pool, &state.weclapp).sync(entity).await?;
    Ok(ApiResponse::success(report))
}

/// GET /api/sync/status - Row count and last sync time per cached entity
pub async fn status(
    State(state): State<AppState>,
    Extension(caller): Extension<ValidatedUser>,
) -> ApiResult<Vec<SyncStatus>> {
    caller.require(SYNC_RUN)?;
    Ok(ApiResponse::success(sync_service::status(&state.pool).await?))
}

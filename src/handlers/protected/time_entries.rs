use axum::{
    extract::{Path, Query, State},
    Extension,
};
use serde::Deserialize;

use super::fetch_page;
use crate::api::{eq_filter, ListQuery};
use crate::database::models::{TimeEntry, TIME_ENTRIES};
use crate::database::Repository;
use crate::handlers::parse_id;
use crate::middleware::{ApiResponse, ApiResult, Page, ValidatedUser};
use crate::permissions::{DataType, TIME_ENTRIES_READ};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct TimeEntryFilters {
    pub task_id: Option<String>,
    pub user_id: Option<String>,
    pub billable: Option<bool>,
}

/// GET /api/time-entries - Booked time; `from`/`to` apply to `start_date`
pub async fn list(
    State(state): State<AppState>,
    Extension(caller): Extension<ValidatedUser>,
    Query(query): Query<ListQuery>,
    Query(filters): Query<TimeEntryFilters>,
) -> ApiResult<Page<TimeEntry>> {
    caller.require(TIME_ENTRIES_READ)?;
    let scope = caller.scope(&state.pool, DataType::TimeEntries).await?;
    let extra = [
        eq_filter("task_id", filters.task_id),
        eq_filter("user_id", filters.user_id),
        eq_filter("billable", filters.billable),
    ]
    .into_iter()
    .flatten()
    .collect();

    let filter = query.to_filter(&TIME_ENTRIES, Some("start_date"), extra, scope, &state.config.api)?;
    Ok(ApiResponse::success(fetch_page(&state.pool, &TIME_ENTRIES, filter).await?))
}

/// GET /api/time-entries/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(caller): Extension<ValidatedUser>,
    Path(id): Path<String>,
) -> ApiResult<TimeEntry> {
    caller.require(TIME_ENTRIES_READ)?;
    let scope = caller.scope(&state.pool, DataType::TimeEntries).await?;
    let entry = Repository::<TimeEntry>::new(&TIME_ENTRIES, state.pool.clone())
        .select_id(parse_id(&id)?, scope)
        .await?;
    Ok(ApiResponse::success(entry))
}

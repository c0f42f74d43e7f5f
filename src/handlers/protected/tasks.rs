use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::fetch_page;
use crate::api::{eq_filter, ListQuery};
use crate::database::models::{Task, TimeEntry, TASKS, TIME_ENTRIES};
use crate::database::Repository;
use crate::error::ApiError;
use crate::handlers::parse_id;
use crate::middleware::{ApiResponse, ApiResult, Page, ValidatedUser};
use crate::permissions::{DataType, TASKS_READ, TASKS_WRITE, TIME_ENTRIES_READ};
use crate::services::task_service::{self, TaskInput};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct TaskFilters {
    pub assignee_user_id: Option<String>,
    pub customer_id: Option<String>,
    pub priority: Option<String>,
}

/// GET /api/tasks - Tasks visible to the caller
///
/// Query: ListQuery plus `assignee_user_id`, `customer_id`, `priority`.
/// `from`/`to` apply to `due_date`.
pub async fn list(
    State(state): State<AppState>,
    Extension(caller): Extension<ValidatedUser>,
    Query(query): Query<ListQuery>,
    Query(filters): Query<TaskFilters>,
) -> ApiResult<Page<Task>> {
    caller.require(TASKS_READ)?;
    let scope = caller.scope(&state.pool, DataType::Tasks).await?;
    let extra = [
        eq_filter("assignee_user_id", filters.assignee_user_id),
        eq_filter("customer_id", filters.customer_id),
        eq_filter("priority", filters.priority),
    ]
    .into_iter()
    .flatten()
    .collect();

    let filter = query.to_filter(&TASKS, Some("due_date"), extra, scope, &state.config.api)?;
    Ok(ApiResponse::success(fetch_page(&state.pool, &TASKS, filter).await?))
}

/// GET /api/tasks/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(caller): Extension<ValidatedUser>,
    Path(id): Path<String>,
) -> ApiResult<Task> {
    caller.require(TASKS_READ)?;
    Ok(ApiResponse::success(load_visible(&state, &caller, &id).await?))
}

/// POST /api/tasks - Create in WeClapp, then cache locally
pub async fn create(
    State(state): State<AppState>,
    Extension(caller): Extension<ValidatedUser>,
    Json(input): Json<TaskInput>,
) -> ApiResult<Task> {
    caller.require(TASKS_WRITE)?;
    let task = task_service::create(&state.pool, &state.weclapp, input).await?;
    Ok(ApiResponse::created(task))
}

/// PATCH /api/tasks/:id - Partial update written through to WeClapp
pub async fn update(
    State(state): State<AppState>,
    Extension(caller): Extension<ValidatedUser>,
    Path(id): Path<String>,
    Json(input): Json<TaskInput>,
) -> ApiResult<Task> {
    caller.require(TASKS_WRITE)?;
    let existing = load_visible(&state, &caller, &id).await?;
    let task = task_service::update(&state.pool, &state.weclapp, &existing, input).await?;
    Ok(ApiResponse::success(task))
}

/// DELETE /api/tasks/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(caller): Extension<ValidatedUser>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    caller.require(TASKS_WRITE)?;
    let existing = load_visible(&state, &caller, &id).await?;
    task_service::delete(&state.pool, &state.weclapp, &existing).await?;
    Ok(ApiResponse::success(json!({ "id": existing.id, "deleted": true })))
}

/// GET /api/tasks/:id/time-entries - Time booked on one task
pub async fn time_entries(
    State(state): State<AppState>,
    Extension(caller): Extension<ValidatedUser>,
    Path(id): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Page<TimeEntry>> {
    caller.require(TIME_ENTRIES_READ)?;
    let task = Repository::<Task>::new(&TASKS, state.pool.clone())
        .select_id(parse_id(&id)?, None)
        .await?;
    let scope = caller.scope(&state.pool, DataType::TimeEntries).await?;
    let filter = query.to_filter(
        &TIME_ENTRIES,
        Some("start_date"),
        vec![json!({ "task_id": task.weclapp_id })],
        scope,
        &state.config.api,
    )?;
    Ok(ApiResponse::success(fetch_page(&state.pool, &TIME_ENTRIES, filter).await?))
}

/// Task by local id within the caller's task scope
async fn load_visible(state: &AppState, caller: &ValidatedUser, id: &str) -> Result<Task, ApiError> {
    let scope = caller.scope(&state.pool, DataType::Tasks).await?;
    let task = Repository::<Task>::new(&TASKS, state.pool.clone())
        .select_id(parse_id(id)?, scope)
        .await?;
    Ok(task)
}

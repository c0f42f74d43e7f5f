use axum::{
    extract::{Path, Query, State},
    Extension,
};
use serde::Deserialize;

use super::fetch_page;
use crate::api::{eq_filter, ListQuery};
use crate::database::models::{WebhookLog, WEBHOOK_LOGS};
use crate::handlers::parse_id;
use crate::middleware::{ApiResponse, ApiResult, Page, ValidatedUser};
use crate::permissions::WEBHOOKS_READ;
use crate::services::webhook_service::WebhookService;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct WebhookLogFilters {
    pub event_type: Option<String>,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
}

/// GET /api/webhooks/logs - Received events, newest first; `from`/`to` apply to `received_at`
pub async fn list(
    State(state): State<AppState>,
    Extension(caller): Extension<ValidatedUser>,
    Query(query): Query<ListQuery>,
    Query(filters): Query<WebhookLogFilters>,
) -> ApiResult<Page<WebhookLog>> {
    caller.require(WEBHOOKS_READ)?;
    let extra = [
        eq_filter("event_type", filters.event_type),
        eq_filter("entity_type", filters.entity_type),
        eq_filter("entity_id", filters.entity_id),
    ]
    .into_iter()
    .flatten()
    .collect();
    let mut query = query;
    query.status = query.status.map(|s| s.to_ascii_uppercase());

    let filter = query.to_filter(&WEBHOOK_LOGS, Some("received_at"), extra, None, &state.config.api)?;
    Ok(ApiResponse::success(fetch_page(&state.pool, &WEBHOOK_LOGS, filter).await?))
}

/// POST /api/webhooks/logs/:id/retry - Process a logged event again (admin only)
pub async fn retry(
    State(state): State<AppState>,
    Extension(caller): Extension<ValidatedUser>,
    Path(id): Path<String>,
) -> ApiResult<WebhookLog> {
    caller.require_admin()?;
    let id = parse_id(&id)?;
    tracing::info!("Webhook {} retried by {}", id, caller.user.email);
    let log = WebhookService::new(&state.pool, &state.weclapp).retry(id).await?;
    Ok(ApiResponse::success(log))
}

use axum::{
    extract::{Path, Query, State},
    Extension,
};
use serde::Deserialize;

use super::fetch_page;
use crate::api::{eq_filter, ListQuery};
use crate::database::models::{Order, ORDERS};
use crate::database::Repository;
use crate::handlers::parse_id;
use crate::middleware::{ApiResponse, ApiResult, Page, ValidatedUser};
use crate::permissions::{DataType, ORDERS_READ};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct OrderFilters {
    pub customer_id: Option<String>,
    pub responsible_user_id: Option<String>,
    pub currency: Option<String>,
}

/// GET /api/orders - Sales orders visible to the caller; `from`/`to` apply to `order_date`
pub async fn list(
    State(state): State<AppState>,
    Extension(caller): Extension<ValidatedUser>,
    Query(query): Query<ListQuery>,
    Query(filters): Query<OrderFilters>,
) -> ApiResult<Page<Order>> {
    caller.require(ORDERS_READ)?;
    let scope = caller.scope(&state.pool, DataType::Orders).await?;
    let extra = [
        eq_filter("customer_id", filters.customer_id),
        eq_filter("responsible_user_id", filters.responsible_user_id),
        eq_filter("currency", filters.currency),
    ]
    .into_iter()
    .flatten()
    .collect();

    let filter = query.to_filter(&ORDERS, Some("order_date"), extra, scope, &state.config.api)?;
    Ok(ApiResponse::success(fetch_page(&state.pool, &ORDERS, filter).await?))
}

/// GET /api/orders/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(caller): Extension<ValidatedUser>,
    Path(id): Path<String>,
) -> ApiResult<Order> {
    caller.require(ORDERS_READ)?;
    let scope = caller.scope(&state.pool, DataType::Orders).await?;
    let order = Repository::<Order>::new(&ORDERS, state.pool.clone())
        .select_id(parse_id(&id)?, scope)
        .await?;
    Ok(ApiResponse::success(order))
}

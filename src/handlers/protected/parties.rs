use axum::{
    extract::{Path, Query, State},
    Extension,
};
use serde::Deserialize;

use super::fetch_page;
use crate::api::{eq_filter, ListQuery};
use crate::database::models::{Party, PARTIES};
use crate::database::Repository;
use crate::handlers::parse_id;
use crate::middleware::{ApiResponse, ApiResult, Page, ValidatedUser};
use crate::permissions::{DataType, PARTIES_READ};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct PartyFilters {
    pub party_type: Option<String>,
    pub is_customer: Option<bool>,
    pub is_supplier: Option<bool>,
    pub responsible_user_id: Option<String>,
}

/// GET /api/parties - Customers, suppliers and contacts; `from`/`to` apply to `created_at`
pub async fn list(
    State(state): State<AppState>,
    Extension(caller): Extension<ValidatedUser>,
    Query(query): Query<ListQuery>,
    Query(filters): Query<PartyFilters>,
) -> ApiResult<Page<Party>> {
    caller.require(PARTIES_READ)?;
    let scope = caller.scope(&state.pool, DataType::Parties).await?;
    let extra = [
        eq_filter("party_type", filters.party_type),
        eq_filter("is_customer", filters.is_customer),
        eq_filter("is_supplier", filters.is_supplier),
        eq_filter("responsible_user_id", filters.responsible_user_id),
    ]
    .into_iter()
    .flatten()
    .collect();

    let filter = query.to_filter(&PARTIES, Some("created_at"), extra, scope, &state.config.api)?;
    Ok(ApiResponse::success(fetch_page(&state.pool, &PARTIES, filter).await?))
}

/// GET /api/parties/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(caller): Extension<ValidatedUser>,
    Path(id): Path<String>,
) -> ApiResult<Party> {
    caller.require(PARTIES_READ)?;
    let scope = caller.scope(&state.pool, DataType::Parties).await?;
    let party = Repository::<Party>::new(&PARTIES, state.pool.clone())
        .select_id(parse_id(&id)?, scope)
        .await?;
    Ok(ApiResponse::success(party))
}

// handlers/protected/mod.rs - Protected handlers (JWT authentication required)
//
// Security Level: JWT session + ACTIVE user re-validated against the database
// Route Prefix: /api/*
// Middleware: jwt_auth_middleware → validate_user_middleware
//
// Every handler receives `Extension<ValidatedUser>` and checks its own
// permission. Entity reads are additionally filtered by the role's data scope,
// so a record outside the caller's scope is indistinguishable from a missing one.

pub mod dashboard;
pub mod invitations;
pub mod me;
pub mod orders;
pub mod parties;
pub mod roles;
pub mod sync;
pub mod tasks;
pub mod time_entries;
pub mod users;
pub mod webhook_logs;

use serde::Serialize;
use sqlx::{postgres::PgRow, FromRow, PgPool};

use crate::database::Repository;
use crate::error::ApiError;
use crate::filter::{FilterData, TableSpec};
use crate::middleware::Page;

/// One paged select plus its count, wrapped for the list envelope
pub(crate) async fn fetch_page<T>(pool: &PgPool, table: &'static TableSpec, filter: FilterData) -> Result<Page<T>, ApiError>
where
    T: for<'r> FromRow<'r, PgRow> + Serialize + Send + Sync + Unpin,
{
    let limit = filter.limit.unwrap_or_default();
    let offset = filter.offset.unwrap_or_default();
    let (items, total) = Repository::<T>::new(table, pool.clone()).select_page(filter).await?;
    Ok(Page {
        items,
        total,
        limit,
        offset,
    })
}

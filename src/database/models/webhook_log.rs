use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::filter::{ColumnKind, TableSpec};

pub const STATUS_RECEIVED: &str = "RECEIVED";
pub const STATUS_PROCESSED: &str = "PROCESSED";
pub const STATUS_FAILED: &str = "FAILED";

/// Event type recorded for bodies that are not JSON
pub const INVALID_EVENT: &str = "invalid";

/// Audit record of one inbound WeClapp event
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WebhookLog {
    pub id: Uuid,
    pub event_type: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub payload: Value,
    pub status: String,
    pub error: Option<String>,
    pub attempts: i32,
    pub received_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

pub static WEBHOOK_LOGS: TableSpec = TableSpec {
    name: "webhook_logs",
    columns: &[
        ("id", ColumnKind::Uuid),
        ("event_type", ColumnKind::Text),
        ("entity_type", ColumnKind::Text),
        ("entity_id", ColumnKind::Text),
        ("status", ColumnKind::Text),
        ("error", ColumnKind::Text),
        ("attempts", ColumnKind::Integer),
        ("received_at", ColumnKind::Timestamp),
        ("processed_at", ColumnKind::Timestamp),
    ],
    search_columns: &["event_type", "entity_id", "error"],
    soft_scoped: false,
    default_order: "received_at desc",
};

pub async fn insert_received(
    pool: &PgPool,
    event_type: &str,
    entity_type: Option<&str>,
    entity_id: Option<&str>,
    payload: &Value,
) -> Result<WebhookLog, DatabaseError> {
    let log = sqlx::query_as::<_, WebhookLog>(
        r#"
        INSERT INTO webhook_logs (id, event_type, entity_type, entity_id, payload, status, attempts, received_at)
        VALUES ($1, $2, $3, $4, $5, $6, 1, NOW())
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(event_type)
    .bind(entity_type)
    .bind(entity_id)
    .bind(payload)
    .bind(STATUS_RECEIVED)
    .fetch_one(pool)
    .await?;
    Ok(log)
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<WebhookLog>, DatabaseError> {
    let log = sqlx::query_as::<_, WebhookLog>("SELECT * FROM webhook_logs WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(log)
}

/// Record the outcome of a processing attempt; `error = None` means success
pub async fn mark_outcome(pool: &PgPool, id: Uuid, error: Option<&str>) -> Result<(), DatabaseError> {
    let status = if error.is_some() { STATUS_FAILED } else { STATUS_PROCESSED };
    sqlx::query("UPDATE webhook_logs SET status = $2, error = $3, processed_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(status)
        .bind(error)
        .execute(pool)
        .await?;
    Ok(())
}

/// Processed without touching the cache; `note` says why
pub async fn mark_ignored(pool: &PgPool, id: Uuid, note: &str) -> Result<(), DatabaseError> {
    sqlx::query("UPDATE webhook_logs SET status = $2, error = $3, processed_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(STATUS_PROCESSED)
        .bind(note)
        .execute(pool)
        .await?;
    Ok(())
}

/// Reset a log row for another manual processing attempt
pub async fn begin_retry(pool: &PgPool, id: Uuid) -> Result<WebhookLog, DatabaseError> {
    sqlx::query_as::<_, WebhookLog>(
        r#"
        UPDATE webhook_logs
        SET status = $2, error = NULL, processed_at = NULL, attempts = attempts + 1
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(STATUS_RECEIVED)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound(format!("webhook log {} not found", id)))
}

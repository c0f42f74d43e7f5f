use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::filter::{ColumnKind, TableSpec};

/// Cached WeClapp time record. `task_id` and `user_id` are WeClapp ids.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TimeEntry {
    pub id: Uuid,
    pub weclapp_id: String,
    pub task_id: Option<String>,
    pub user_id: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub duration_seconds: i64,
    pub billable: bool,
    pub is_active: bool,
    pub last_sync_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub static TIME_ENTRIES: TableSpec = TableSpec {
    name: "time_entries",
    columns: &[
        ("id", ColumnKind::Uuid),
        ("weclapp_id", ColumnKind::Text),
        ("task_id", ColumnKind::Text),
        ("user_id", ColumnKind::Text),
        ("description", ColumnKind::Text),
        ("start_date", ColumnKind::Timestamp),
        ("duration_seconds", ColumnKind::Integer),
        ("billable", ColumnKind::Boolean),
        ("is_active", ColumnKind::Boolean),
        ("last_sync_at", ColumnKind::Timestamp),
        ("created_at", ColumnKind::Timestamp),
        ("updated_at", ColumnKind::Timestamp),
    ],
    search_columns: &["description"],
    soft_scoped: true,
    default_order: "start_date desc",
};

#[derive(Debug, Clone, PartialEq)]
pub struct TimeEntryUpsert {
    pub weclapp_id: String,
    pub task_id: Option<String>,
    pub user_id: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub duration_seconds: i64,
    pub billable: bool,
}

impl TimeEntryUpsert {
    pub async fn upsert(&self, pool: &PgPool) -> Result<TimeEntry, DatabaseError> {
        let entry = sqlx::query_as::<_, TimeEntry>(
            r#"
            INSERT INTO time_entries (
                id, weclapp_id, task_id, user_id, description, start_date,
                duration_seconds, billable, is_active, last_sync_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, TRUE, NOW(), NOW(), NOW())
            ON CONFLICT (weclapp_id) DO UPDATE SET
                task_id = EXCLUDED.task_id,
                user_id = EXCLUDED.user_id,
                description = EXCLUDED.description,
                start_date = EXCLUDED.start_date,
                duration_seconds = EXCLUDED.duration_seconds,
                billable = EXCLUDED.billable,
                is_active = TRUE,
                last_sync_at = NOW(),
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&self.weclapp_id)
        .bind(&self.task_id)
        .bind(&self.user_id)
        .bind(&self.description)
        .bind(self.start_date)
        .bind(self.duration_seconds)
        .bind(self.billable)
        .fetch_one(pool)
        .await?;

        Ok(entry)
    }
}

pub async fn delete_by_weclapp_id(pool: &PgPool, weclapp_id: &str) -> Result<u64, DatabaseError> {
    let result = sqlx::query("DELETE FROM time_entries WHERE weclapp_id = $1")
        .bind(weclapp_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::filter::{ColumnKind, TableSpec};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: Uuid,
    pub weclapp_id: String,
    pub subject: String,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub assignee_user_id: Option<String>,
    pub creator_user_id: Option<String>,
    pub customer_id: Option<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub planned_effort_seconds: Option<i64>,
    pub is_active: bool,
    pub last_sync_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub static TASKS: TableSpec = TableSpec {
    name: "tasks",
    columns: &[
        ("id", ColumnKind::Uuid),
        ("weclapp_id", ColumnKind::Text),
        ("subject", ColumnKind::Text),
        ("description", ColumnKind::Text),
        ("status", ColumnKind::Text),
        ("priority", ColumnKind::Text),
        ("assignee_user_id", ColumnKind::Text),
        ("creator_user_id", ColumnKind::Text),
        ("customer_id", ColumnKind::Text),
        ("date_from", ColumnKind::Timestamp),
        ("due_date", ColumnKind::Timestamp),
        ("planned_effort_seconds", ColumnKind::Integer),
        ("is_active", ColumnKind::Boolean),
        ("last_sync_at", ColumnKind::Timestamp),
        ("created_at", ColumnKind::Timestamp),
        ("updated_at", ColumnKind::Timestamp),
    ],
    search_columns: &["subject", "description"],
    soft_scoped: true,
    default_order: "due_date asc, subject",
};

/// Locally cached shape of a WeClapp task, keyed by `weclapp_id`
#[derive(Debug, Clone, PartialEq)]
pub struct TaskUpsert {
    pub weclapp_id: String,
    pub subject: String,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub assignee_user_id: Option<String>,
    pub creator_user_id: Option<String>,
    pub customer_id: Option<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub planned_effort_seconds: Option<i64>,
}

impl TaskUpsert {
    pub async fn upsert(&self, pool: &PgPool) -> Result<Task, DatabaseError> {
        let task = sqlx::query_as::<_, Task>(
            r#"
            INSERT INTO tasks (
                id, weclapp_id, subject, description, status, priority,
                assignee_user_id, creator_user_id, customer_id, date_from, due_date,
                planned_effort_seconds, is_active, last_sync_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, TRUE, NOW(), NOW(), NOW())
            ON CONFLICT (weclapp_id) DO UPDATE SET
                subject = EXCLUDED.subject,
                description = EXCLUDED.description,
                status = EXCLUDED.status,
                priority = EXCLUDED.priority,
                assignee_user_id = EXCLUDED.assignee_user_id,
                creator_user_id = EXCLUDED.creator_user_id,
                customer_id = EXCLUDED.customer_id,
                date_from = EXCLUDED.date_from,
                due_date = EXCLUDED.due_date,
                planned_effort_seconds = EXCLUDED.planned_effort_seconds,
                is_active = TRUE,
                last_sync_at = NOW(),
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&self.weclapp_id)
        .bind(&self.subject)
        .bind(&self.description)
        .bind(&self.status)
        .bind(&self.priority)
        .bind(&self.assignee_user_id)
        .bind(&self.creator_user_id)
        .bind(&self.customer_id)
        .bind(self.date_from)
        .bind(self.due_date)
        .bind(self.planned_effort_seconds)
        .fetch_one(pool)
        .await?;

        Ok(task)
    }
}

/// Remove the local copy of a task deleted in WeClapp
pub async fn delete_by_weclapp_id(pool: &PgPool, weclapp_id: &str) -> Result<u64, DatabaseError> {
    let result = sqlx::query("DELETE FROM tasks WHERE weclapp_id = $1")
        .bind(weclapp_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

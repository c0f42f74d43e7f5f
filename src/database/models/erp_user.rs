use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::filter::{ColumnKind, TableSpec};

/// Cached WeClapp user identity, the source for linking application users
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ErpUser {
    pub id: Uuid,
    pub weclapp_id: String,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub status: Option<String>,
    pub is_active: bool,
    pub last_sync_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ErpUser {
    pub fn display_name(&self) -> String {
        let full = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if !full.is_empty() {
            full
        } else {
            self.username.clone().unwrap_or_else(|| self.weclapp_id.clone())
        }
    }
}

pub static ERP_USERS: TableSpec = TableSpec {
    name: "erp_users",
    columns: &[
        ("id", ColumnKind::Uuid),
        ("weclapp_id", ColumnKind::Text),
        ("username", ColumnKind::Text),
        ("first_name", ColumnKind::Text),
        ("last_name", ColumnKind::Text),
        ("email", ColumnKind::Text),
        ("status", ColumnKind::Text),
        ("is_active", ColumnKind::Boolean),
        ("last_sync_at", ColumnKind::Timestamp),
    ],
    search_columns: &["username", "first_name", "last_name", "email"],
    soft_scoped: true,
    default_order: "last_name, first_name",
};

#[derive(Debug, Clone, PartialEq)]
pub struct ErpUserUpsert {
    pub weclapp_id: String,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub status: Option<String>,
    pub is_active: bool,
}

impl ErpUserUpsert {
    pub async fn upsert(&self, pool: &PgPool) -> Result<ErpUser, DatabaseError> {
        let user = sqlx::query_as::<_, ErpUser>(
            r#"
            INSERT INTO erp_users (
                id, weclapp_id, username, first_name, last_name, email, status,
                is_active, last_sync_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW(), NOW())
            ON CONFLICT (weclapp_id) DO UPDATE SET
                username = EXCLUDED.username,
                first_name = EXCLUDED.first_name,
                last_name = EXCLUDED.last_name,
                email = EXCLUDED.email,
                status = EXCLUDED.status,
                is_active = EXCLUDED.is_active,
                last_sync_at = NOW(),
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&self.weclapp_id)
        .bind(&self.username)
        .bind(&self.first_name)
        .bind(&self.last_name)
        .bind(&self.email)
        .bind(&self.status)
        .bind(self.is_active)
        .fetch_one(pool)
        .await?;

        Ok(user)
    }
}

pub async fn find_by_weclapp_id(pool: &PgPool, weclapp_id: &str) -> Result<Option<ErpUser>, DatabaseError> {
    let user = sqlx::query_as::<_, ErpUser>("SELECT * FROM erp_users WHERE weclapp_id = $1")
        .bind(weclapp_id)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

/// Active ERP users with no application user linked to them yet
pub async fn find_unlinked(pool: &PgPool) -> Result<Vec<ErpUser>, DatabaseError> {
    let users = sqlx::query_as::<_, ErpUser>(
        r#"
        SELECT e.* FROM erp_users e
        WHERE e.is_active = TRUE
          AND NOT EXISTS (SELECT 1 FROM users u WHERE u.weclapp_user_id = e.weclapp_id)
        ORDER BY e.last_name NULLS LAST, e.first_name NULLS LAST
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(users)
}

pub async fn delete_by_weclapp_id(pool: &PgPool, weclapp_id: &str) -> Result<u64, DatabaseError> {
    let result = sqlx::query("DELETE FROM erp_users WHERE weclapp_id = $1")
        .bind(weclapp_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn erp_user(first: Option<&str>, last: Option<&str>, username: Option<&str>) -> ErpUser {
        let now = Utc::now();
        ErpUser {
            id: Uuid::new_v4(),
            weclapp_id: "4711".to_string(),
            username: username.map(String::from),
            first_name: first.map(String::from),
            last_name: last.map(String::from),
            email: None,
            status: Some("ACTIVE".to_string()),
            is_active: true,
            last_sync_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn display_name_prefers_full_name() {
        assert_eq!(erp_user(Some("Ada"), Some("Lovelace"), Some("ada")).display_name(), "Ada Lovelace");
        assert_eq!(erp_user(None, Some("Lovelace"), None).display_name(), "Lovelace");
        assert_eq!(erp_user(None, None, Some("ada")).display_name(), "ada");
        assert_eq!(erp_user(Some(""), None, None).display_name(), "4711");
    }
}

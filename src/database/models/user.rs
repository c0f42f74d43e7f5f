use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, PgPool};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::filter::{ColumnKind, TableSpec};

/// Application-level account, optionally linked 1:1 to a WeClapp user
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub role_id: String,
    pub department: Option<String>,
    pub weclapp_user_id: Option<String>,
    pub status: String,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    Pending,
    Active,
    Inactive,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Pending => "PENDING",
            UserStatus::Active => "ACTIVE",
            UserStatus::Inactive => "INACTIVE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Some(UserStatus::Pending),
            "ACTIVE" => Some(UserStatus::Active),
            "INACTIVE" => Some(UserStatus::Inactive),
            _ => None,
        }
    }
}

impl User {
    pub fn status(&self) -> Option<UserStatus> {
        UserStatus::parse(&self.status)
    }

    pub fn is_active(&self) -> bool {
        self.status() == Some(UserStatus::Active)
    }
}

pub static USERS: TableSpec = TableSpec {
    name: "users",
    columns: &[
        ("id", ColumnKind::Uuid),
        ("email", ColumnKind::Text),
        ("name", ColumnKind::Text),
        ("role_id", ColumnKind::Text),
        ("department", ColumnKind::Text),
        ("weclapp_user_id", ColumnKind::Text),
        ("status", ColumnKind::Text),
        ("last_login_at", ColumnKind::Timestamp),
        ("created_at", ColumnKind::Timestamp),
        ("updated_at", ColumnKind::Timestamp),
    ],
    search_columns: &["email", "name", "department"],
    soft_scoped: false,
    default_order: "name, email",
};

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: Option<String>,
    pub role_id: String,
    pub department: Option<String>,
    pub weclapp_user_id: Option<String>,
    pub status: UserStatus,
}

/// Field-level update; `None` leaves the column untouched, `Some(None)` clears it
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<Option<String>>,
    pub role_id: Option<String>,
    pub department: Option<Option<String>>,
    pub weclapp_user_id: Option<Option<String>>,
    pub status: Option<UserStatus>,
}

pub async fn insert<'e, E: PgExecutor<'e>>(executor: E, new_user: &NewUser) -> Result<User, DatabaseError> {
    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (id, email, name, role_id, department, weclapp_user_id, status, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, NOW(), NOW())
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(normalize_email(&new_user.email))
    .bind(&new_user.name)
    .bind(&new_user.role_id)
    .bind(&new_user.department)
    .bind(&new_user.weclapp_user_id)
    .bind(new_user.status.as_str())
    .fetch_one(executor)
    .await?;
    Ok(user)
}

pub async fn find_by_id<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> Result<Option<User>, DatabaseError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(user)
}

pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, DatabaseError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(normalize_email(email))
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

pub async fn find_by_weclapp_user_id(pool: &PgPool, weclapp_user_id: &str) -> Result<Option<User>, DatabaseError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE weclapp_user_id = $1")
        .bind(weclapp_user_id)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

/// WeClapp ids of all linked, active users in a department
pub async fn weclapp_ids_in_department(pool: &PgPool, department: &str) -> Result<Vec<String>, DatabaseError> {
    let ids: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT weclapp_user_id FROM users
        WHERE department = $1 AND weclapp_user_id IS NOT NULL AND status = 'ACTIVE'
        "#,
    )
    .bind(department)
    .fetch_all(pool)
    .await?;
    Ok(ids.into_iter().map(|(id,)| id).collect())
}

pub async fn count_by_role(pool: &PgPool, role_id: &str) -> Result<i64, DatabaseError> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE role_id = $1")
        .bind(role_id)
        .fetch_one(pool)
        .await?;
    Ok(count.0)
}

pub async fn update<'e, E: PgExecutor<'e>>(executor: E, id: Uuid, changes: &UserChanges) -> Result<User, DatabaseError> {
    // COALESCE keeps the current value for untouched columns; the boolean flags
    // distinguish "leave alone" from "set to NULL" for nullable columns
    sqlx::query_as::<_, User>(
        r#"
        UPDATE users SET
            name = CASE WHEN $2 THEN $3 ELSE name END,
            role_id = COALESCE($4, role_id),
            department = CASE WHEN $5 THEN $6 ELSE department END,
            weclapp_user_id = CASE WHEN $7 THEN $8 ELSE weclapp_user_id END,
            status = COALESCE($9, status),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(changes.name.is_some())
    .bind(changes.name.clone().flatten())
    .bind(&changes.role_id)
    .bind(changes.department.is_some())
    .bind(changes.department.clone().flatten())
    .bind(changes.weclapp_user_id.is_some())
    .bind(changes.weclapp_user_id.clone().flatten())
    .bind(changes.status.map(|s| s.as_str()))
    .fetch_optional(executor)
    .await?
    .ok_or_else(|| DatabaseError::NotFound(format!("user {} not found", id)))
}

pub async fn touch_last_login(pool: &PgPool, id: Uuid) -> Result<(), DatabaseError> {
    sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> Result<u64, DatabaseError> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parsing_is_case_insensitive() {
        assert_eq!(UserStatus::parse("active"), Some(UserStatus::Active));
        assert_eq!(UserStatus::parse("PENDING"), Some(UserStatus::Pending));
        assert_eq!(UserStatus::parse("gone"), None);
        assert_eq!(UserStatus::Inactive.as_str(), "INACTIVE");
    }

    #[test]
    fn emails_are_normalized() {
        assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
    }
}

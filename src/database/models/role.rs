use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, PgExecutor, PgPool};

use crate::database::manager::DatabaseError;

/// Custom role stored in the database. System roles live in code.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RoleRow {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub permissions: Json<Vec<String>>,
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RoleDataScopeRow {
    pub role_id: String,
    pub data_type: String,
    pub scope: String,
}

pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<RoleRow>, DatabaseError> {
    let role = sqlx::query_as::<_, RoleRow>("SELECT * FROM roles WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(role)
}

pub async fn list(pool: &PgPool) -> Result<Vec<RoleRow>, DatabaseError> {
    let roles = sqlx::query_as::<_, RoleRow>("SELECT * FROM roles ORDER BY name")
        .fetch_all(pool)
        .await?;
    Ok(roles)
}

pub async fn scopes_for(pool: &PgPool, role_id: &str) -> Result<Vec<RoleDataScopeRow>, DatabaseError> {
    let scopes = sqlx::query_as::<_, RoleDataScopeRow>(
        "SELECT role_id, data_type, scope FROM role_data_scopes WHERE role_id = $1 ORDER BY data_type",
    )
    .bind(role_id)
    .fetch_all(pool)
    .await?;
    Ok(scopes)
}

pub async fn insert<'e, E: PgExecutor<'e>>(
    executor: E,
    id: &str,
    name: &str,
    description: Option<&str>,
    permissions: &[String],
) -> Result<RoleRow, DatabaseError> {
    let role = sqlx::query_as::<_, RoleRow>(
        r#"
        INSERT INTO roles (id, name, description, permissions, is_system, created_at, updated_at)
        VALUES ($1, $2, $3, $4, FALSE, NOW(), NOW())
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(description)
    .bind(Json(permissions))
    .fetch_one(executor)
    .await?;
    Ok(role)
}

pub async fn update<'e, E: PgExecutor<'e>>(
    executor: E,
    id: &str,
    name: Option<&str>,
    description: Option<Option<&str>>,
    permissions: Option<&[String]>,
) -> Result<RoleRow, DatabaseError> {
    sqlx::query_as::<_, RoleRow>(
        r#"
        UPDATE roles SET
            name = COALESCE($2, name),
            description = CASE WHEN $3 THEN $4 ELSE description END,
            permissions = COALESCE($5, permissions),
            updated_at = NOW()
        WHERE id = $1 AND is_system = FALSE
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(description.is_some())
    .bind(description.flatten())
    .bind(permissions.map(Json))
    .fetch_optional(executor)
    .await?
    .ok_or_else(|| DatabaseError::NotFound(format!("role {} not found", id)))
}

pub async fn insert_scope<'e, E: PgExecutor<'e>>(
    executor: E,
    role_id: &str,
    data_type: &str,
    scope: &str,
) -> Result<(), DatabaseError> {
    sqlx::query("INSERT INTO role_data_scopes (role_id, data_type, scope) VALUES ($1, $2, $3)")
        .bind(role_id)
        .bind(data_type)
        .bind(scope)
        .execute(executor)
        .await?;
    Ok(())
}

pub async fn delete_scopes<'e, E: PgExecutor<'e>>(executor: E, role_id: &str) -> Result<(), DatabaseError> {
    sqlx::query("DELETE FROM role_data_scopes WHERE role_id = $1")
        .bind(role_id)
        .execute(executor)
        .await?;
    Ok(())
}

pub async fn delete<'e, E: PgExecutor<'e>>(executor: E, id: &str) -> Result<u64, DatabaseError> {
    let result = sqlx::query("DELETE FROM roles WHERE id = $1 AND is_system = FALSE")
        .bind(id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

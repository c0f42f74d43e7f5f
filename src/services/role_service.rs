use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::BTreeMap;
use tracing::info;

use super::{double_option, ServiceError, ServiceResult};
use crate::database::models::{role, user};
use crate::database::DatabaseError;
use crate::permissions::{self, roles, DataScope, DataType, ResolvedRole};

#[derive(Debug, Serialize)]
pub struct RoleSummary {
    #[serde(flatten)]
    pub role: ResolvedRole,
    pub user_count: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateRole {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub scopes: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateRole {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub permissions: Option<Vec<String>>,
    /// Replaces the whole scope map when present
    pub scopes: Option<BTreeMap<String, String>>,
}

/// System roles first, then custom roles by name
pub async fn list(pool: &PgPool) -> ServiceResult<Vec<RoleSummary>> {
    let mut resolved = roles::system_roles();
    for row in role::list(pool).await? {
        if roles::is_system_role(&row.id) {
            continue;
        }
        let scope_rows = role::scopes_for(pool, &row.id).await?;
        resolved.push(ResolvedRole::from_row(row, scope_rows));
    }

    let mut summaries = Vec::with_capacity(resolved.len());
    for role in resolved {
        let user_count = user::count_by_role(pool, &role.id).await?;
        summaries.push(RoleSummary { role, user_count });
    }
    Ok(summaries)
}

pub async fn get(pool: &PgPool, id: &str) -> ServiceResult<RoleSummary> {
    let role = permissions::find_role(pool, id)
        .await?
        .ok_or_else(|| ServiceError::not_found(format!("role '{}' not found", id)))?;
    let user_count = user::count_by_role(pool, id).await?;
    Ok(RoleSummary { role, user_count })
}

/// Insert the role row and its scope rows in one transaction
pub async fn create(pool: &PgPool, input: CreateRole) -> ServiceResult<ResolvedRole> {
    let id = input.id.trim().to_string();
    validate_slug(&id)?;
    let name = validate_name(&input.name)?;
    validate_permissions(&input.permissions)?;
    let scopes = parse_scopes(&input.scopes)?;

    if roles::is_system_role(&id) || role::find_by_id(pool, &id).await?.is_some() {
        return Err(ServiceError::conflict(format!("role '{}' already exists", id)));
    }

    let mut tx = pool.begin().await.map_err(DatabaseError::from)?;
    role::insert(&mut *tx, &id, &name, input.description.as_deref(), &input.permissions).await?;
    for (data_type, scope) in &scopes {
        role::insert_scope(&mut *tx, &id, data_type.as_str(), scope.as_str()).await?;
    }
    tx.commit().await.map_err(DatabaseError::from)?;

    info!("Role '{}' created with {} permissions", id, input.permissions.len());
    resolved(pool, &id).await
}

pub async fn update(pool: &PgPool, id: &str, input: UpdateRole) -> ServiceResult<ResolvedRole> {
    if roles::is_system_role(id) {
        return Err(ServiceError::forbidden(format!("system role '{}' cannot be modified", id)));
    }
    if role::find_by_id(pool, id).await?.is_none() {
        return Err(ServiceError::not_found(format!("role '{}' not found", id)));
    }
    let name = input.name.as_deref().map(validate_name).transpose()?;
    if let Some(permissions) = &input.permissions {
        validate_permissions(permissions)?;
    }
    let scopes = input.scopes.as_ref().map(parse_scopes).transpose()?;

    let mut tx = pool.begin().await.map_err(DatabaseError::from)?;
    role::update(
        &mut *tx,
        id,
        name.as_deref(),
        input.description.as_ref().map(|d| d.as_deref()),
        input.permissions.as_deref(),
    )
    .await?;
    if let Some(scopes) = &scopes {
        role::delete_scopes(&mut *tx, id).await?;
        for (data_type, scope) in scopes {
            role::insert_scope(&mut *tx, id, data_type.as_str(), scope.as_str()).await?;
        }
    }
    tx.commit().await.map_err(DatabaseError::from)?;

    info!("Role '{}' updated", id);
    resolved(pool, id).await
}

pub async fn delete(pool: &PgPool, id: &str) -> ServiceResult<()> {
    if roles::is_system_role(id) {
        return Err(ServiceError::forbidden(format!("system role '{}' cannot be deleted", id)));
    }
    if role::find_by_id(pool, id).await?.is_none() {
        return Err(ServiceError::not_found(format!("role '{}' not found", id)));
    }
    let holders = user::count_by_role(pool, id).await?;
    if holders > 0 {
        return Err(ServiceError::conflict(format!(
            "role '{}' is still assigned to {} user(s)",
            id, holders
        )));
    }

    let mut tx = pool.begin().await.map_err(DatabaseError::from)?;
    role::delete_scopes(&mut *tx, id).await?;
    role::delete(&mut *tx, id).await?;
    tx.commit().await.map_err(DatabaseError::from)?;
    info!("Role '{}' deleted", id);
    Ok(())
}

async fn resolved(pool: &PgPool, id: &str) -> ServiceResult<ResolvedRole> {
    permissions::find_role(pool, id)
        .await?
        .ok_or_else(|| ServiceError::not_found(format!("role '{}' not found", id)))
}

fn validate_slug(id: &str) -> ServiceResult<()> {
    let valid_chars = id
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
    if !(2..=50).contains(&id.len()) || !valid_chars {
        return Err(ServiceError::field(
            "id",
            "must be 2-50 characters of lowercase letters, digits, '-' or '_'",
        ));
    }
    Ok(())
}

fn validate_name(name: &str) -> ServiceResult<String> {
    let name = name.trim();
    if name.is_empty() || name.len() > 100 {
        return Err(ServiceError::field("name", "must be 1-100 characters"));
    }
    Ok(name.to_string())
}

fn validate_permissions(list: &[String]) -> ServiceResult<()> {
    match list.iter().find(|p| !permissions::is_known_permission(p)) {
        Some(unknown) => Err(ServiceError::field("permissions", format!("unknown permission '{}'", unknown))),
        None => Ok(()),
    }
}

fn parse_scopes(raw: &BTreeMap<String, String>) -> ServiceResult<BTreeMap<DataType, DataScope>> {
    let mut scopes = BTreeMap::new();
    for (data_type, scope) in raw {
        let data_type = DataType::parse(data_type)
            .ok_or_else(|| ServiceError::field("scopes", format!("unknown data type '{}'", data_type)))?;
        let scope = DataScope::parse(scope)
            .ok_or_else(|| ServiceError::field("scopes", format!("unknown scope '{}'", scope)))?;
        // missing entries already mean none
        if scope != DataScope::None {
            scopes.insert(data_type, scope);
        }
    }
    Ok(scopes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_rules() {
        assert!(validate_slug("sales-team_2").is_ok());
        assert!(validate_slug("a").is_err());
        assert!(validate_slug("Sales").is_err());
        assert!(validate_slug("with space").is_err());
        assert!(validate_slug(&"x".repeat(51)).is_err());
        assert!(validate_slug(&"x".repeat(50)).is_ok());
    }

    #[test]
    fn permissions_must_be_known() {
        assert!(validate_permissions(&["tasks:read".to_string(), "orders:read".to_string()]).is_ok());
        assert!(matches!(
            validate_permissions(&["tasks:delete".to_string()]),
            Err(ServiceError::Validation { .. })
        ));
    }

    #[test]
    fn scopes_parse_and_drop_none() {
        let mut raw = BTreeMap::new();
        raw.insert("tasks".to_string(), "department".to_string());
        raw.insert("orders".to_string(), "none".to_string());
        let parsed = parse_scopes(&raw).unwrap();
        assert_eq!(parsed.get(&DataType::Tasks), Some(&DataScope::Department));
        assert!(!parsed.contains_key(&DataType::Orders));

        raw.insert("invoices".to_string(), "all".to_string());
        assert!(parse_scopes(&raw).is_err());
    }
}

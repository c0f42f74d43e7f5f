use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use super::{double_option, grantable_role, ServiceError, ServiceResult};
use crate::database::models::{erp_user, user, ErpUser, NewUser, User, UserChanges, UserStatus};
use crate::permissions::{self, ResolvedRole};

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUser {
    #[serde(default, deserialize_with = "double_option")]
    pub name: Option<Option<String>>,
    pub role_id: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub department: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub weclapp_user_id: Option<Option<String>>,
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PromoteErpUser {
    pub role_id: Option<String>,
    pub department: Option<String>,
}

/// Role given to promoted ERP users when none is requested
pub const DEFAULT_ROLE: &str = "employee";

pub async fn get(pool: &PgPool, id: Uuid) -> ServiceResult<User> {
    user::find_by_id(pool, id)
        .await?
        .ok_or_else(|| ServiceError::not_found(format!("user {} not found", id)))
}

/// Apply an admin edit. Users cannot deactivate or demote themselves, and
/// cannot touch users whose role they could not grant.
pub async fn update(
    pool: &PgPool,
    actor: &User,
    actor_role: &ResolvedRole,
    id: Uuid,
    input: UpdateUser,
) -> ServiceResult<User> {
    let target = get(pool, id).await?;
    ensure_manageable(pool, actor_role, &target).await?;

    let status = match input.status.as_deref() {
        None => None,
        Some(raw) => match UserStatus::parse(raw) {
            Some(status @ (UserStatus::Active | UserStatus::Inactive)) => Some(status),
            _ => return Err(ServiceError::field("status", "must be ACTIVE or INACTIVE")),
        },
    };
    if let Some(role_id) = input.role_id.as_deref() {
        grantable_role(pool, actor_role, role_id).await?;
    }

    if actor.id == target.id {
        if status == Some(UserStatus::Inactive) {
            return Err(ServiceError::forbidden("You cannot deactivate your own account"));
        }
        if input.role_id.as_deref().is_some_and(|role| role != actor.role_id) {
            return Err(ServiceError::forbidden("You cannot change your own role"));
        }
    }
    if target.status() == Some(UserStatus::Pending) && status.is_some() {
        return Err(ServiceError::conflict("Pending users are activated by accepting their invitation"));
    }

    if let Some(Some(weclapp_id)) = &input.weclapp_user_id {
        ensure_linkable(pool, weclapp_id, Some(target.id)).await?;
    }

    let changes = UserChanges {
        name: input.name.map(|n| n.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())),
        role_id: input.role_id,
        department: input.department.map(|d| d.map(|d| d.trim().to_string()).filter(|d| !d.is_empty())),
        weclapp_user_id: input.weclapp_user_id,
        status,
    };
    let updated = user::update(pool, id, &changes).await?;
    info!("User {} updated by {}", updated.email, actor.email);
    Ok(updated)
}

pub async fn deactivate(pool: &PgPool, actor: &User, actor_role: &ResolvedRole, id: Uuid) -> ServiceResult<User> {
    if actor.id == id {
        return Err(ServiceError::forbidden("You cannot deactivate your own account"));
    }
    let target = get(pool, id).await?;
    ensure_manageable(pool, actor_role, &target).await?;
    let changes = UserChanges {
        status: Some(UserStatus::Inactive),
        ..Default::default()
    };
    let updated = user::update(pool, id, &changes).await?;
    info!("User {} deactivated by {}", updated.email, actor.email);
    Ok(updated)
}

/// Cached ERP users not yet linked to an application user
pub async fn erp_candidates(pool: &PgPool) -> ServiceResult<Vec<ErpUser>> {
    Ok(erp_user::find_unlinked(pool).await?)
}

/// Create an active application user from a cached ERP user
pub async fn promote_from_erp(
    pool: &PgPool,
    actor_role: &ResolvedRole,
    weclapp_id: &str,
    input: PromoteErpUser,
) -> ServiceResult<User> {
    let role_id = input.role_id.unwrap_or_else(|| DEFAULT_ROLE.to_string());
    grantable_role(pool, actor_role, &role_id).await?;

    let erp = erp_user::find_by_weclapp_id(pool, weclapp_id)
        .await?
        .ok_or_else(|| ServiceError::not_found(format!("ERP user {} not found", weclapp_id)))?;
    ensure_linkable(pool, weclapp_id, None).await?;

    let email = erp
        .email
        .as_deref()
        .map(user::normalize_email)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ServiceError::validation(format!("ERP user {} has no email address", weclapp_id)))?;
    if user::find_by_email(pool, &email).await?.is_some() {
        return Err(ServiceError::conflict(format!("A user with email {} already exists", email)));
    }

    let new_user = NewUser {
        email,
        name: Some(erp.display_name()),
        role_id,
        department: input.department,
        weclapp_user_id: Some(erp.weclapp_id.clone()),
        status: UserStatus::Active,
    };
    let created = user::insert(pool, &new_user).await?;
    info!("ERP user {} promoted to {}", erp.weclapp_id, created.email);
    Ok(created)
}

/// The target's current role must be one the actor could grant
async fn ensure_manageable(pool: &PgPool, actor_role: &ResolvedRole, target: &User) -> ServiceResult<()> {
    let current = permissions::resolve(pool, &target.role_id).await?;
    if actor_role.can_grant(&current) {
        Ok(())
    } else {
        Err(ServiceError::forbidden(format!(
            "You cannot manage users with role '{}'",
            target.role_id
        )))
    }
}

/// A WeClapp user may back at most one application user
async fn ensure_linkable(pool: &PgPool, weclapp_id: &str, for_user: Option<Uuid>) -> ServiceResult<()> {
    match user::find_by_weclapp_user_id(pool, weclapp_id).await? {
        Some(existing) if Some(existing.id) != for_user => Err(ServiceError::conflict(format!(
            "WeClapp user {} is already linked to {}",
            weclapp_id, existing.email
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_body_distinguishes_clear_from_keep() {
        let input: UpdateUser =
            serde_json::from_str(r#"{"department": null, "role_id": "viewer", "status": "INACTIVE"}"#).unwrap();
        assert_eq!(input.department, Some(None));
        assert_eq!(input.name, None);
        assert_eq!(input.weclapp_user_id, None);
        assert_eq!(input.role_id.as_deref(), Some("viewer"));
    }
}

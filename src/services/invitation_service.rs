use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use super::{grantable_role, ServiceError, ServiceResult};
use crate::auth::{self, Claims};
use crate::config::AppConfig;
use crate::database::models::{invitation, user, Invitation, InvitationStatus, NewUser, User, UserChanges, UserStatus};
use crate::permissions::{self, ResolvedRole};

#[derive(Debug, Deserialize)]
pub struct CreateInvitation {
    pub email: String,
    pub role_id: String,
    pub name: Option<String>,
    pub department: Option<String>,
    pub weclapp_user_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AcceptInvitation {
    pub name: Option<String>,
}

/// Returned once when a token is minted; the raw token is not stored
#[derive(Debug, Serialize)]
pub struct IssuedInvitation {
    pub invitation: Invitation,
    pub token: String,
    pub accept_url: String,
}

/// What an invitee may see before accepting
#[derive(Debug, Serialize)]
pub struct InvitationPreview {
    pub email: String,
    pub role_id: String,
    pub role_name: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct AcceptedInvitation {
    pub token: String,
    pub user: User,
}

pub async fn list(pool: &PgPool, status: Option<InvitationStatus>) -> ServiceResult<Vec<Invitation>> {
    let invitations = sqlx::query_as::<_, Invitation>(
        "SELECT * FROM invitations WHERE ($1::text IS NULL OR status = $1) ORDER BY created_at DESC",
    )
    .bind(status.map(|s| s.as_str()))
    .fetch_all(pool)
    .await
    .map_err(crate::database::DatabaseError::from)?;
    Ok(invitations)
}

/// Create the provisional user and its invitation in one transaction. Any
/// expired invitation for the same email is revoked in the same step.
pub async fn create(
    pool: &PgPool,
    config: &AppConfig,
    grantor: &ResolvedRole,
    invited_by: Option<Uuid>,
    input: CreateInvitation,
) -> ServiceResult<IssuedInvitation> {
    let email = user::normalize_email(&input.email);
    if !is_plausible_email(&email) {
        return Err(ServiceError::field("email", "must be a valid email address"));
    }
    grantable_role(pool, grantor, &input.role_id).await?;

    let existing_user = user::find_by_email(pool, &email).await?;
    match existing_user.as_ref().and_then(User::status) {
        Some(UserStatus::Active) => {
            return Err(ServiceError::conflict(format!("{} already has an active account", email)));
        }
        Some(UserStatus::Inactive) => {
            return Err(ServiceError::conflict(format!("{} has a deactivated account; reactivate it instead", email)));
        }
        _ => {}
    }
    if let Some(pending) = invitation::find_pending_by_email(pool, &email).await? {
        if !pending.is_expired_at(Utc::now()) {
            return Err(ServiceError::conflict(format!("{} already has a pending invitation", email)));
        }
    }

    let token = auth::generate_invitation_token();
    let expires_at = Utc::now() + Duration::hours(config.invitations.expiry_hours);

    let mut tx = pool.begin().await.map_err(crate::database::DatabaseError::from)?;
    let superseded = invitation::revoke_open_for_email(&mut *tx, &email).await?;
    let provisional = match existing_user {
        // left behind by an invitation that expired
        Some(pending_user) => {
            let changes = UserChanges {
                name: Some(input.name.clone()),
                role_id: Some(input.role_id.clone()),
                department: Some(input.department.clone()),
                weclapp_user_id: Some(input.weclapp_user_id.clone()),
                status: None,
            };
            user::update(&mut *tx, pending_user.id, &changes).await?
        }
        None => {
            let new_user = NewUser {
                email: email.clone(),
                name: input.name.clone(),
                role_id: input.role_id.clone(),
                department: input.department.clone(),
                weclapp_user_id: input.weclapp_user_id.clone(),
                status: UserStatus::Pending,
            };
            user::insert(&mut *tx, &new_user).await?
        }
    };
    let created = invitation::insert(
        &mut *tx,
        &email,
        &input.role_id,
        provisional.id,
        &auth::hash_token(&token),
        expires_at,
        invited_by,
    )
    .await?;
    tx.commit().await.map_err(crate::database::DatabaseError::from)?;

    if superseded > 0 {
        info!("Revoked {} superseded invitation(s) for {}", superseded, email);
    }
    info!("Invitation {} created for {} as {}", created.id, email, created.role_id);
    Ok(IssuedInvitation {
        accept_url: accept_url(&config.api.app_base_url, &token),
        invitation: created,
        token,
    })
}

/// Public lookup by raw token
pub async fn preview(pool: &PgPool, token: &str) -> ServiceResult<InvitationPreview> {
    let found = open_invitation(pool, token).await?;
    let role = permissions::resolve(pool, &found.role_id).await?;
    Ok(InvitationPreview {
        email: found.email,
        role_id: found.role_id,
        role_name: role.name,
        expires_at: found.expires_at,
    })
}

/// Accept once: invitation PENDING -> ACCEPTED, user PENDING -> ACTIVE, session issued
pub async fn accept(
    pool: &PgPool,
    config: &AppConfig,
    token: &str,
    input: AcceptInvitation,
) -> ServiceResult<AcceptedInvitation> {
    let found = open_invitation(pool, token).await?;
    let user_id = found
        .user_id
        .ok_or_else(|| ServiceError::not_found("invitation has no pending account"))?;

    let mut tx = pool.begin().await.map_err(crate::database::DatabaseError::from)?;
    if invitation::mark_accepted(&mut *tx, found.id).await?.is_none() {
        return Err(ServiceError::conflict("Invitation has already been used"));
    }
    match user::find_by_id(&mut *tx, user_id).await? {
        Some(pending) if pending.status() == Some(UserStatus::Pending) => {}
        _ => return Err(ServiceError::conflict("Invitation account is no longer pending")),
    }
    let changes = UserChanges {
        name: input
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .map(Some),
        status: Some(UserStatus::Active),
        ..Default::default()
    };
    let activated = user::update(&mut *tx, user_id, &changes).await?;

    // a session that cannot be signed leaves the invitation open
    let claims = Claims::new(
        activated.id,
        &activated.email,
        &activated.role_id,
        config.security.jwt_expiry_hours,
    );
    let session = auth::generate_jwt(&config.security.jwt_secret, &claims)?;
    tx.commit().await.map_err(crate::database::DatabaseError::from)?;
    user::touch_last_login(pool, activated.id).await?;

    info!("Invitation {} accepted by {}", found.id, activated.email);
    Ok(AcceptedInvitation {
        token: session,
        user: activated,
    })
}

/// New token and expiry for a pending or expired invitation whose
/// provisional user is still waiting on it
pub async fn resend(
    pool: &PgPool,
    config: &AppConfig,
    grantor: &ResolvedRole,
    id: Uuid,
) -> ServiceResult<IssuedInvitation> {
    let found = find(pool, id).await?;
    match found.status() {
        Some(InvitationStatus::Pending) | Some(InvitationStatus::Expired) => {}
        _ => {
            return Err(ServiceError::conflict(format!(
                "Invitation is {} and cannot be resent",
                found.status.to_lowercase()
            )))
        }
    }
    grantable_role(pool, grantor, &found.role_id).await?;

    let provisional = match found.user_id {
        Some(user_id) => user::find_by_id(pool, user_id).await?,
        None => None,
    };
    if provisional.as_ref().and_then(User::status) != Some(UserStatus::Pending) {
        return Err(ServiceError::conflict("Invitation account is no longer pending"));
    }
    if invitation::has_other_pending(pool, &found.email, found.id).await? {
        return Err(ServiceError::conflict(format!(
            "{} has a newer pending invitation",
            found.email
        )));
    }

    let token = auth::generate_invitation_token();
    let expires_at = Utc::now() + Duration::hours(config.invitations.expiry_hours);
    let refreshed = invitation::refresh_token(pool, id, &auth::hash_token(&token), expires_at).await?;
    info!("Invitation {} reissued for {}", refreshed.id, refreshed.email);
    Ok(IssuedInvitation {
        accept_url: accept_url(&config.api.app_base_url, &token),
        invitation: refreshed,
        token,
    })
}

/// Revoke an open invitation and drop its provisional user
pub async fn revoke(pool: &PgPool, id: Uuid) -> ServiceResult<Invitation> {
    let found = find(pool, id).await?;
    match found.status() {
        Some(InvitationStatus::Pending) | Some(InvitationStatus::Expired) => {}
        _ => {
            return Err(ServiceError::conflict(format!(
                "Invitation is {} and cannot be revoked",
                found.status.to_lowercase()
            )))
        }
    }

    let mut tx = pool.begin().await.map_err(crate::database::DatabaseError::from)?;
    invitation::set_status(&mut *tx, id, InvitationStatus::Revoked).await?;
    if let Some(user_id) = found.user_id {
        let shared = invitation::count_open_for_user(&mut *tx, user_id, id).await? > 0;
        if let Some(provisional) = user::find_by_id(&mut *tx, user_id).await? {
            if provisional.status() == Some(UserStatus::Pending) && !shared {
                user::delete(&mut *tx, user_id).await?;
            }
        }
    }
    tx.commit().await.map_err(crate::database::DatabaseError::from)?;

    info!("Invitation {} for {} revoked", id, found.email);
    find(pool, id).await
}

async fn find(pool: &PgPool, id: Uuid) -> ServiceResult<Invitation> {
    invitation::find_by_id(pool, id)
        .await?
        .ok_or_else(|| ServiceError::not_found(format!("invitation {} not found", id)))
}

/// Invitation for a raw token that can still be accepted. Expired pending
/// invitations are flipped to EXPIRED on the way out.
async fn open_invitation(pool: &PgPool, token: &str) -> ServiceResult<Invitation> {
    let found = invitation::find_by_token_hash(pool, &auth::hash_token(token))
        .await?
        .ok_or_else(|| ServiceError::not_found("invitation not found"))?;

    match found.status() {
        Some(InvitationStatus::Pending) if found.is_expired_at(Utc::now()) => {
            invitation::set_status(pool, found.id, InvitationStatus::Expired).await?;
            Err(ServiceError::Gone("invitation has expired".to_string()))
        }
        Some(InvitationStatus::Pending) => Ok(found),
        Some(InvitationStatus::Expired) => Err(ServiceError::Gone("invitation has expired".to_string())),
        Some(InvitationStatus::Accepted) => Err(ServiceError::conflict("Invitation has already been used")),
        _ => Err(ServiceError::not_found("invitation not found")),
    }
}

fn accept_url(base_url: &str, token: &str) -> String {
    format!("{}/auth/invitations/{}", base_url.trim_end_matches('/'), token)
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.') && !email.contains(' ')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_url_joins_base_and_token() {
        assert_eq!(
            accept_url("https://manager.example.com/", "abc123"),
            "https://manager.example.com/auth/invitations/abc123"
        );
    }

    #[test]
    fn email_plausibility() {
        assert!(is_plausible_email("ada@example.com"));
        assert!(!is_plausible_email("ada@example"));
        assert!(!is_plausible_email("@example.com"));
        assert!(!is_plausible_email("ada example@example.com"));
        assert!(!is_plausible_email("ada"));
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, PgPool};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::filter::{ColumnKind, TableSpec};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invitation {
    pub id: Uuid,
    pub email: String,
    pub role_id: String,
    /// Provisional user; cleared when a revoked invitation's user row is removed
    pub user_id: Option<Uuid>,
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub status: String,
    pub expires_at: DateTime<Utc>,
    pub invited_by: Option<Uuid>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Revoked,
    Expired,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Pending => "PENDING",
            InvitationStatus::Accepted => "ACCEPTED",
            InvitationStatus::Revoked => "REVOKED",
            InvitationStatus::Expired => "EXPIRED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Some(InvitationStatus::Pending),
            "ACCEPTED" => Some(InvitationStatus::Accepted),
            "REVOKED" => Some(InvitationStatus::Revoked),
            "EXPIRED" => Some(InvitationStatus::Expired),
            _ => None,
        }
    }
}

impl Invitation {
    pub fn status(&self) -> Option<InvitationStatus> {
        InvitationStatus::parse(&self.status)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

pub static INVITATIONS: TableSpec = TableSpec {
    name: "invitations",
    columns: &[
        ("id", ColumnKind::Uuid),
        ("email", ColumnKind::Text),
        ("role_id", ColumnKind::Text),
        ("user_id", ColumnKind::Uuid),
        ("status", ColumnKind::Text),
        ("expires_at", ColumnKind::Timestamp),
        ("invited_by", ColumnKind::Uuid),
        ("accepted_at", ColumnKind::Timestamp),
        ("created_at", ColumnKind::Timestamp),
    ],
    search_columns: &["email"],
    soft_scoped: false,
    default_order: "created_at desc",
};

pub async fn insert<'e, E: PgExecutor<'e>>(
    executor: E,
    email: &str,
    role_id: &str,
    user_id: Uuid,
    token_hash: &str,
    expires_at: DateTime<Utc>,
    invited_by: Option<Uuid>,
) -> Result<Invitation, DatabaseError> {
    let invitation = sqlx::query_as::<_, Invitation>(
        r#"
        INSERT INTO invitations (id, email, role_id, user_id, token_hash, status, expires_at, invited_by, created_at)
        VALUES ($1, $2, $3, $4, $5, 'PENDING', $6, $7, NOW())
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(role_id)
    .bind(user_id)
    .bind(token_hash)
    .bind(expires_at)
    .bind(invited_by)
    .fetch_one(executor)
    .await?;
    Ok(invitation)
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Invitation>, DatabaseError> {
    let invitation = sqlx::query_as::<_, Invitation>("SELECT * FROM invitations WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(invitation)
}

pub async fn find_by_token_hash(pool: &PgPool, token_hash: &str) -> Result<Option<Invitation>, DatabaseError> {
    let invitation = sqlx::query_as::<_, Invitation>("SELECT * FROM invitations WHERE token_hash = $1")
        .bind(token_hash)
        .fetch_optional(pool)
        .await?;
    Ok(invitation)
}

pub async fn find_pending_by_email(pool: &PgPool, email: &str) -> Result<Option<Invitation>, DatabaseError> {
    let invitation = sqlx::query_as::<_, Invitation>(
        "SELECT * FROM invitations WHERE email = $1 AND status = 'PENDING' ORDER BY created_at DESC LIMIT 1",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(invitation)
}

/// PENDING -> ACCEPTED. Returns `None` when the invitation was not pending, so a
/// token can only ever be accepted once.
pub async fn mark_accepted<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> Result<Option<Invitation>, DatabaseError> {
    let invitation = sqlx::query_as::<_, Invitation>(
        r#"
        UPDATE invitations SET status = 'ACCEPTED', accepted_at = NOW()
        WHERE id = $1 AND status = 'PENDING' AND expires_at > NOW()
        RETURNING *
        "#,
    )
    .bind(id)
    .fetch_optional(executor)
    .await?;
    Ok(invitation)
}

pub async fn set_status<'e, E: PgExecutor<'e>>(
    executor: E,
    id: Uuid,
    status: InvitationStatus,
) -> Result<(), DatabaseError> {
    sqlx::query("UPDATE invitations SET status = $2 WHERE id = $1")
        .bind(id)
        .bind(status.as_str())
        .execute(executor)
        .await?;
    Ok(())
}

/// Close every open invitation for `email`. Used when a new invitation
/// supersedes them, so only one can ever be accepted.
pub async fn revoke_open_for_email<'e, E: PgExecutor<'e>>(executor: E, email: &str) -> Result<u64, DatabaseError> {
    let result = sqlx::query("UPDATE invitations SET status = 'REVOKED' WHERE email = $1 AND status IN ('PENDING', 'EXPIRED')")
        .bind(email)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

/// Whether any PENDING invitation other than `except` exists for `email`
pub async fn has_other_pending(pool: &PgPool, email: &str, except: Uuid) -> Result<bool, DatabaseError> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM invitations WHERE email = $1 AND id <> $2 AND status = 'PENDING')",
    )
    .bind(email)
    .bind(except)
    .fetch_one(pool)
    .await?;
    Ok(exists)
}

/// Open invitations other than `except` still pointing at `user_id`
pub async fn count_open_for_user<'e, E: PgExecutor<'e>>(
    executor: E,
    user_id: Uuid,
    except: Uuid,
) -> Result<i64, DatabaseError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM invitations WHERE user_id = $1 AND id <> $2 AND status IN ('PENDING', 'EXPIRED')",
    )
    .bind(user_id)
    .bind(except)
    .fetch_one(executor)
    .await?;
    Ok(count)
}

pub async fn refresh_token(
    pool: &PgPool,
    id: Uuid,
    token_hash: &str,
    expires_at: DateTime<Utc>,
) -> Result<Invitation, DatabaseError> {
    sqlx::query_as::<_, Invitation>(
        r#"
        UPDATE invitations SET token_hash = $2, expires_at = $3, status = 'PENDING'
        WHERE id = $1 AND status IN ('PENDING', 'EXPIRED')
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(token_hash)
    .bind(expires_at)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound(format!("open invitation {} not found", id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn expiry_is_inclusive_of_the_deadline() {
        let now = Utc::now();
        let invitation = Invitation {
            id: Uuid::new_v4(),
            email: "a@b.c".to_string(),
            role_id: "employee".to_string(),
            user_id: Some(Uuid::new_v4()),
            token_hash: "x".to_string(),
            status: "PENDING".to_string(),
            expires_at: now,
            invited_by: None,
            accepted_at: None,
            created_at: now - Duration::hours(1),
        };
        assert!(invitation.is_expired_at(now));
        assert!(!invitation.is_expired_at(now - Duration::seconds(1)));
        assert_eq!(invitation.status(), Some(InvitationStatus::Pending));
    }
}

pub mod dashboard_service;
pub mod invitation_service;
pub mod role_service;
pub mod sync_service;
pub mod task_service;
pub mod user_service;
pub mod webhook_service;

use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use sqlx::PgPool;
use thiserror::Error;

use crate::auth::JwtError;
use crate::database::DatabaseError;
use crate::permissions::{self, ResolvedRole};
use crate::weclapp::WeclappError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{message}")]
    Validation {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Gone(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Weclapp(#[from] WeclappError),

    #[error(transparent)]
    Jwt(#[from] JwtError),
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation {
            message: message.into(),
            field_errors: None,
        }
    }

    pub fn field(field: &str, problem: impl Into<String>) -> Self {
        let mut field_errors = HashMap::new();
        field_errors.insert(field.to_string(), problem.into());
        ServiceError::Validation {
            message: "Invalid field value".to_string(),
            field_errors: Some(field_errors),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ServiceError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ServiceError::Conflict(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ServiceError::Forbidden(message.into())
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Resolve `role_id` for assignment by a holder of `grantor`
pub(crate) async fn grantable_role(pool: &PgPool, grantor: &ResolvedRole, role_id: &str) -> ServiceResult<ResolvedRole> {
    let role = permissions::find_role(pool, role_id)
        .await?
        .ok_or_else(|| ServiceError::field("role_id", format!("unknown role '{}'", role_id)))?;
    if !grantor.can_grant(&role) {
        return Err(ServiceError::forbidden(format!("You cannot grant role '{}'", role.id)));
    }
    Ok(role)
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`)
/// in PATCH bodies. Use together with `#[serde(default)]`.
pub fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "double_option")]
        department: Option<Option<String>>,
    }

    #[test]
    fn double_option_separates_null_from_absent() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        let cleared: Patch = serde_json::from_str(r#"{"department": null}"#).unwrap();
        let set: Patch = serde_json::from_str(r#"{"department": "Sales"}"#).unwrap();
        assert_eq!(absent.department, None);
        assert_eq!(cleared.department, Some(None));
        assert_eq!(set.department, Some(Some("Sales".to_string())));
    }
}

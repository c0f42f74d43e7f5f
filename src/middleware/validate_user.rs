use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use serde_json::Value;
use sqlx::PgPool;

use super::auth::AuthUser;
use crate::database::models::{user, User};
use crate::error::ApiError;
use crate::permissions::{self, scope, DataType, ResolvedRole};
use crate::state::AppState;

/// Database-confirmed caller: an ACTIVE user and the role on their row
#[derive(Clone, Debug)]
pub struct ValidatedUser {
    pub user: User,
    pub role: ResolvedRole,
}

impl ValidatedUser {
    pub fn require(&self, permission: &str) -> Result<(), ApiError> {
        if self.role.has(permission) {
            Ok(())
        } else {
            tracing::debug!("{} lacks permission {}", self.user.email, permission);
            Err(ApiError::forbidden(format!("Missing permission '{}'", permission)))
        }
    }

    pub fn is_admin(&self) -> bool {
        self.user.role_id == permissions::ADMIN_ROLE
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ApiError::forbidden("Administrator role required"))
        }
    }

    /// Where-object restricting `data_type` to the caller's scope; `None` when unrestricted
    pub async fn scope(&self, pool: &PgPool, data_type: DataType) -> Result<Option<Value>, ApiError> {
        let condition = scope::condition_for(pool, &self.user, &self.role, data_type).await?;
        Ok(condition.to_where())
    }
}

/// Re-loads the JWT subject on every request. Role changes and deactivation
/// take effect without waiting for the token to expire.
pub async fn validate_user_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_user = request
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or_else(|| ApiError::unauthorized("JWT authentication required before user validation"))?;

    let found = user::find_by_id(&state.pool, auth_user.user_id).await?.ok_or_else(|| {
        tracing::warn!("Session for unknown user {} ({})", auth_user.user_id, auth_user.email);
        ApiError::unauthorized("User no longer exists")
    })?;

    if !found.is_active() {
        tracing::warn!("Session for {} rejected: status {}", found.email, found.status);
        return Err(ApiError::forbidden(format!("User '{}' is not active", found.email)));
    }

    let role = permissions::resolve(&state.pool, &found.role_id).await?;
    tracing::debug!("Validated {} as {}", found.email, role.id);

    request.extensions_mut().insert(ValidatedUser { user: found, role });
    Ok(next.run(request).await)
}

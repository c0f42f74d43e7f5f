use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::auth::JwtError;
use crate::database::DatabaseError;
use crate::filter::FilterError;
use crate::services::ServiceError;
use crate::webhook::SignatureError;
use crate::weclapp::WeclappError;

/// Every failure a handler can return. Rendered as `{success: false, error, code}`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    ValidationError {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    /// Expired invitation links
    Gone(String),
    InternalServerError(String),
    /// WeClapp answered with an error or not at all
    BadGateway(String),
    ServiceUnavailable(String),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, &str) {
        use ApiError::*;
        match self {
            BadRequest(m) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", m),
            ValidationError { message, .. } => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message),
            Unauthorized(m) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", m),
            Forbidden(m) => (StatusCode::FORBIDDEN, "FORBIDDEN", m),
            NotFound(m) => (StatusCode::NOT_FOUND, "NOT_FOUND", m),
            Conflict(m) => (StatusCode::CONFLICT, "CONFLICT", m),
            Gone(m) => (StatusCode::GONE, "GONE", m),
            InternalServerError(m) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_SERVER_ERROR", m),
            BadGateway(m) => (StatusCode::BAD_GATEWAY, "BAD_GATEWAY", m),
            ServiceUnavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", m),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.parts().0
    }

    pub fn code(&self) -> &'static str {
        self.parts().1
    }

    /// Client-safe message
    pub fn message(&self) -> &str {
        self.parts().2
    }

    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "success": false,
            "error": self.message(),
            "code": self.code(),
        });
        if let ApiError::ValidationError {
            field_errors: Some(fields),
            ..
        } = self
        {
            body["field_errors"] = json!(fields);
        }
        body
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    /// Validation error for a single field
    pub fn field_error(field: &str, problem: impl Into<String>) -> Self {
        ApiError::ValidationError {
            message: "Invalid field value".to_string(),
            field_errors: Some(HashMap::from([(field.to_string(), problem.into())])),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    fn unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        if err.is_unique_violation() {
            return ApiError::Conflict("Record already exists".to_string());
        }
        match err {
            DatabaseError::NotFound(msg) => ApiError::not_found(msg),
            DatabaseError::Filter(filter_err) => filter_err.into(),
            DatabaseError::ConfigMissing(_) | DatabaseError::InvalidDatabaseUrl => {
                tracing::error!("Database misconfigured: {}", err);
                ApiError::unavailable("Database temporarily unavailable")
            }
            DatabaseError::Sqlx(sqlx::Error::PoolTimedOut) | DatabaseError::Sqlx(sqlx::Error::Io(_)) => {
                tracing::error!("Database unavailable: {}", err);
                ApiError::unavailable("Database temporarily unavailable")
            }
            DatabaseError::QueryError(_) | DatabaseError::Sqlx(_) => {
                // SQL details stay in the log
                tracing::error!("Query failed: {}", err);
                ApiError::internal("Database error")
            }
        }
    }
}

impl From<FilterError> for ApiError {
    fn from(err: FilterError) -> Self {
        ApiError::bad_request(err.to_string())
    }
}

impl From<WeclappError> for ApiError {
    fn from(err: WeclappError) -> Self {
        match err {
            WeclappError::NotConfigured(_) => ApiError::unavailable(err.to_string()),
            WeclappError::NotFound(_) => ApiError::not_found(err.to_string()),
            _ => {
                tracing::error!("WeClapp request failed: {}", err);
                ApiError::BadGateway("WeClapp request failed".to_string())
            }
        }
    }
}

impl From<SignatureError> for ApiError {
    fn from(err: SignatureError) -> Self {
        ApiError::unauthorized(err.to_string())
    }
}

impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::MissingSecret => {
                tracing::error!("JWT_SECRET is not set; sessions cannot be issued or checked");
                ApiError::internal("Session tokens are not configured")
            }
            JwtError::Encode(_) => {
                tracing::error!("Failed to sign session token: {}", err);
                ApiError::internal("Failed to issue session token")
            }
            _ => ApiError::unauthorized(err.to_string()),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation { message, field_errors } => ApiError::ValidationError { message, field_errors },
            ServiceError::NotFound(msg) => ApiError::NotFound(msg),
            ServiceError::Conflict(msg) => ApiError::Conflict(msg),
            ServiceError::Forbidden(msg) => ApiError::Forbidden(msg),
            ServiceError::Gone(msg) => ApiError::Gone(msg),
            ServiceError::Database(e) => e.into(),
            ServiceError::Weclapp(e) => e.into(),
            ServiceError::Jwt(e) => e.into(),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status(), Json(self.to_json())).into_response()
    }
}

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::database::DatabaseManager;
use crate::state::AppState;

/// GET / - Service name, version and route overview
pub async fn root(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "WeClapp Manager",
            "version": env!("CARGO_PKG_VERSION"),
            "environment": state.config.environment,
            "weclapp_configured": state.weclapp.is_configured(),
            "endpoints": {
                "health": "/health (public)",
                "webhook": "POST /api/webhooks/weclapp (HMAC signature)",
                "invitations": "/auth/invitations/:token[/accept] (public)",
                "tasks": "/api/tasks[/:id[/time-entries]]",
                "orders": "/api/orders[/:id]",
                "parties": "/api/parties[/:id]",
                "time_entries": "/api/time-entries[/:id]",
                "users": "/api/users[/:id], /api/users/erp-candidates, /api/users/from-erp/:weclapp_id",
                "roles": "/api/roles[/:id]",
                "admin_invitations": "/api/invitations[/:id[/resend]]",
                "sync": "/api/sync[/:entity], /api/sync/status",
                "webhook_logs": "/api/webhooks/logs[/:id/retry]",
                "dashboard": "/api/dashboard/stats",
                "me": "/api/me",
            }
        }
    }))
}

/// GET /health - Liveness plus a database round trip
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match DatabaseManager::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "database unavailable",
                    "code": "SERVICE_UNAVAILABLE",
                    "data": {
                        "status": "degraded",
                        "timestamp": now,
                        "database": "unavailable"
                    }
                })),
            )
        }
    }
}

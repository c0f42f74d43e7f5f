use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers::{protected, public};
use crate::middleware::{jwt_auth_middleware, validate_user_middleware};
use crate::state::AppState;

/// Full application router
pub fn app(state: AppState) -> Router {
    let body_limit = state.config.api.max_request_size_bytes;
    let cors = cors_layer(&state.config.security.cors_origins);

    Router::new()
        // Public
        .merge(public_routes())
        // Session required
        .merge(protected_routes(state.clone()))
        // Global middleware
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(public::health::root))
        .route("/health", get(public::health::health))
        .route("/api/webhooks/weclapp", post(public::webhook::receive))
        .route("/auth/invitations/:token", get(public::invitations::preview))
        .route("/auth/invitations/:token/accept", post(public::invitations::accept))
}

fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(entity_routes())
        .merge(admin_routes())
        .route("/api/dashboard/stats", get(protected::dashboard::stats))
        .route("/api/me", get(protected::me::get))
        // route_layer keeps unknown paths at 404 instead of 401; jwt runs first
        .route_layer(from_fn_with_state(state.clone(), validate_user_middleware))
        .route_layer(from_fn_with_state(state, jwt_auth_middleware))
}

fn entity_routes() -> Router<AppState> {
    use protected::{orders, parties, tasks, time_entries};

    Router::new()
        .route("/api/tasks", get(tasks::list).post(tasks::create))
        .route(
            "/api/tasks/:id",
            get(tasks::get).patch(tasks::update).delete(tasks::delete),
        )
        .route("/api/tasks/:id/time-entries", get(tasks::time_entries))
        .route("/api/orders", get(orders::list))
        .route("/api/orders/:id", get(orders::get))
        .route("/api/parties", get(parties::list))
        .route("/api/parties/:id", get(parties::get))
        .route("/api/time-entries", get(time_entries::list))
        .route("/api/time-entries/:id", get(time_entries::get))
}

fn admin_routes() -> Router<AppState> {
    use protected::{invitations, roles, sync, users, webhook_logs};

    Router::new()
        // Users
        .route("/api/users", get(users::list))
        .route("/api/users/erp-candidates", get(users::erp_candidates))
        .route("/api/users/from-erp/:weclapp_id", post(users::promote_from_erp))
        .route(
            "/api/users/:id",
            get(users::get).patch(users::update).delete(users::deactivate),
        )
        // Roles
        .route("/api/roles", get(roles::list).post(roles::create))
        .route(
            "/api/roles/:id",
            get(roles::get).patch(roles::update).delete(roles::delete),
        )
        // Invitations
        .route("/api/invitations", get(invitations::list).post(invitations::create))
        .route("/api/invitations/:id", delete(invitations::revoke))
        .route("/api/invitations/:id/resend", post(invitations::resend))
        // Sync
        .route("/api/sync", post(sync::sync_all))
        .route("/api/sync/status", get(sync::status))
        .route("/api/sync/:entity", post(sync::sync_entity))
        // Webhook log
        .route("/api/webhooks/logs", get(webhook_logs::list))
        .route("/api/webhooks/logs/:id/retry", post(webhook_logs::retry))
}

/// Configured origins; an empty list allows any origin
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    if allowed.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(allowed)
    }
}

//! In-process app backed by a real Postgres. Tests that use it return early
//! when DATABASE_URL is unset.
#![allow(dead_code)]

use anyhow::{Context, Result};
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use sqlx::{Executor, PgPool};
use tower::ServiceExt;
use uuid::Uuid;

use weclapp_manager::auth::{generate_jwt, Claims};
use weclapp_manager::config::AppConfig;
use weclapp_manager::database::models::{user, NewUser, User, UserStatus};
use weclapp_manager::database::DatabaseManager;
use weclapp_manager::weclapp::WeclappClient;
use weclapp_manager::{app, AppState};

pub const JWT_SECRET: &str = "db-test-jwt-secret";
pub const WEBHOOK_SECRET: &str = "db-test-webhook-secret";

const SCHEMA: &str = include_str!("../../docs/schema.sql");
// serializes concurrent CREATE ... IF NOT EXISTS runs
const SCHEMA_LOCK: i64 = 7_305_112;

pub struct TestDb {
    pub pool: PgPool,
    pub config: AppConfig,
}

impl TestDb {
    /// Connect and apply the schema, or `None` without DATABASE_URL
    pub async fn connect() -> Result<Option<Self>> {
        let url = match std::env::var("DATABASE_URL") {
            Ok(url) if !url.trim().is_empty() => url,
            _ => {
                eprintln!("DATABASE_URL not set; skipping database test");
                return Ok(None);
            }
        };

        let mut config = AppConfig::development();
        config.database.url = url;
        config.database.max_connections = 4;
        config.database.acquire_timeout_secs = 10;
        config.security.jwt_secret = JWT_SECRET.to_string();
        config.weclapp.webhook_secret = WEBHOOK_SECRET.to_string();

        let pool = DatabaseManager::connect(&config.database).await?;
        let mut conn = pool.acquire().await?;
        sqlx::query("SELECT pg_advisory_lock($1)")
            .bind(SCHEMA_LOCK)
            .execute(&mut *conn)
            .await?;
        let applied = (&mut *conn).execute(SCHEMA).await;
        sqlx::query("SELECT pg_advisory_unlock($1)")
            .bind(SCHEMA_LOCK)
            .execute(&mut *conn)
            .await?;
        applied.context("failed to apply docs/schema.sql")?;
        drop(conn);

        Ok(Some(Self { pool, config }))
    }

    pub fn app(&self) -> Result<Router> {
        self.app_with(self.config.clone())
    }

    /// Router over the same pool with a different configuration
    pub fn app_with(&self, config: AppConfig) -> Result<Router> {
        let client = WeclappClient::new(&config.weclapp)?;
        Ok(app(AppState::new(self.pool.clone(), config, client)))
    }

    /// ACTIVE user with a unique email
    pub async fn create_user(&self, role_id: &str, weclapp_user_id: Option<&str>) -> Result<User> {
        let new_user = NewUser {
            email: unique_email(role_id),
            name: Some(format!("Test {}", role_id)),
            role_id: role_id.to_string(),
            department: None,
            weclapp_user_id: weclapp_user_id.map(str::to_string),
            status: UserStatus::Active,
        };
        Ok(user::insert(&self.pool, &new_user).await?)
    }
}

pub fn suffix() -> String {
    Uuid::new_v4().simple().to_string()[..10].to_string()
}

pub fn unique_email(prefix: &str) -> String {
    format!("{}-{}@example.com", prefix, suffix())
}

pub fn session(user: &User) -> Result<String> {
    let claims = Claims::new(user.id, &user.email, &user.role_id, 1);
    Ok(generate_jwt(JWT_SECRET, &claims)?)
}

/// One request through the router; the body is JSON or `Null` when empty
pub async fn send(
    app: &Router,
    method: Method,
    path: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Result<(StatusCode, Value)> {
    let mut request = Request::builder().method(method).uri(path);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let body = match body {
        Some(value) => {
            request = request.header(header::CONTENT_TYPE, "application/json");
            Body::from(serde_json::to_vec(&value)?)
        }
        None => Body::empty(),
    };

    let res = app.clone().oneshot(request.body(body)?).await?;
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await?;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, value))
}

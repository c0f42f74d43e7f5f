mod common;

use anyhow::{Context, Result};
use axum::http::{Method, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use uuid::Uuid;

use common::db::{self, send, session, TestDb};
use weclapp_manager::database::models::{invitation, user, InvitationStatus, UserStatus};

/// POST /api/invitations as `token`; returns the `data` object
async fn invite(app: &Router, token: &str, email: &str, role_id: &str) -> Result<Value> {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/invitations",
        Some(token),
        Some(json!({"email": email, "role_id": role_id})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    Ok(body["data"].clone())
}

fn id_of(issued: &Value) -> Result<Uuid> {
    let id = issued["invitation"]["id"].as_str().context("invitation id")?;
    Ok(Uuid::parse_str(id)?)
}

fn token_of(issued: &Value) -> Result<String> {
    Ok(issued["token"].as_str().context("invitation token")?.to_string())
}

async fn expire(db: &TestDb, id: Uuid) -> Result<()> {
    sqlx::query("UPDATE invitations SET expires_at = NOW() - INTERVAL '1 hour' WHERE id = $1")
        .bind(id)
        .execute(&db.pool)
        .await?;
    Ok(())
}

async fn status_of(db: &TestDb, id: Uuid) -> Result<Option<InvitationStatus>> {
    let found = invitation::find_by_id(&db.pool, id).await?.context("invitation row")?;
    Ok(found.status())
}

#[tokio::test]
async fn invitation_is_accepted_exactly_once() -> Result<()> {
    let Some(db) = TestDb::connect().await? else { return Ok(()) };
    let app = db.app()?;
    let admin = session(&db.create_user("admin", None).await?)?;
    let issued = invite(&app, &admin, &db::unique_email("once"), "employee").await?;
    let accept = format!("/auth/invitations/{}/accept", token_of(&issued)?);

    let (status, body) = send(&app, Method::POST, &accept, None, Some(json!({"name": "Ada"}))).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["user"]["status"], "ACTIVE");
    assert_eq!(body["data"]["user"]["name"], "Ada");

    let fresh = body["data"]["token"].as_str().context("session token")?;
    let (status, me) = send(&app, Method::GET, "/api/me", Some(fresh), None).await?;
    assert_eq!(status, StatusCode::OK, "{}", me);

    let (status, _) = send(&app, Method::POST, &accept, None, None).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(status_of(&db, id_of(&issued)?).await?, Some(InvitationStatus::Accepted));
    Ok(())
}

#[tokio::test]
async fn unsignable_session_leaves_invitation_open() -> Result<()> {
    let Some(db) = TestDb::connect().await? else { return Ok(()) };
    let app = db.app()?;
    let admin = session(&db.create_user("admin", None).await?)?;
    let issued = invite(&app, &admin, &db::unique_email("nosecret"), "viewer").await?;
    let accept = format!("/auth/invitations/{}/accept", token_of(&issued)?);

    let mut broken = db.config.clone();
    broken.security.jwt_secret = String::new();
    let (status, _) = send(&db.app_with(broken)?, Method::POST, &accept, None, None).await?;
    assert!(status.is_server_error(), "{}", status);

    assert_eq!(status_of(&db, id_of(&issued)?).await?, Some(InvitationStatus::Pending));
    let user_id = Uuid::parse_str(issued["invitation"]["user_id"].as_str().context("user id")?)?;
    let provisional = user::find_by_id(&db.pool, user_id).await?.context("provisional user")?;
    assert_eq!(provisional.status(), Some(UserStatus::Pending));

    let (status, body) = send(&app, Method::POST, &accept, None, None).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    Ok(())
}

#[tokio::test]
async fn reinviting_revokes_the_expired_invitation() -> Result<()> {
    let Some(db) = TestDb::connect().await? else { return Ok(()) };
    let app = db.app()?;
    let admin = session(&db.create_user("admin", None).await?)?;
    let email = db::unique_email("again");

    let first = invite(&app, &admin, &email, "employee").await?;
    let first_id = id_of(&first)?;
    expire(&db, first_id).await?;

    let second = invite(&app, &admin, &email, "viewer").await?;
    assert_eq!(second["invitation"]["user_id"], first["invitation"]["user_id"]);
    assert_eq!(status_of(&db, first_id).await?, Some(InvitationStatus::Revoked));

    let resend = format!("/api/invitations/{}/resend", first_id);
    let (status, _) = send(&app, Method::POST, &resend, Some(&admin), None).await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&app, Method::DELETE, &format!("/api/invitations/{}", first_id), Some(&admin), None).await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let stale = format!("/auth/invitations/{}/accept", token_of(&first)?);
    let (status, _) = send(&app, Method::POST, &stale, None, None).await?;
    assert_ne!(status, StatusCode::OK);

    let current = format!("/auth/invitations/{}/accept", token_of(&second)?);
    let (status, body) = send(&app, Method::POST, &current, None, None).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["user"]["role_id"], "viewer");
    Ok(())
}

#[tokio::test]
async fn expired_invitation_can_be_resent_until_accepted() -> Result<()> {
    let Some(db) = TestDb::connect().await? else { return Ok(()) };
    let app = db.app()?;
    let admin = session(&db.create_user("admin", None).await?)?;
    let issued = invite(&app, &admin, &db::unique_email("late"), "employee").await?;
    let id = id_of(&issued)?;
    expire(&db, id).await?;

    let old = format!("/auth/invitations/{}/accept", token_of(&issued)?);
    let (status, _) = send(&app, Method::POST, &old, None, None).await?;
    assert_eq!(status, StatusCode::GONE);

    let resend = format!("/api/invitations/{}/resend", id);
    let (status, body) = send(&app, Method::POST, &resend, Some(&admin), None).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let renewed = token_of(&body["data"])?;
    assert_ne!(renewed, token_of(&issued)?);

    let accept = format!("/auth/invitations/{}/accept", renewed);
    let (status, _) = send(&app, Method::POST, &accept, None, None).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, Method::POST, &resend, Some(&admin), None).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    Ok(())
}

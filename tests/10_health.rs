mod common;

use anyhow::Result;
use reqwest::StatusCode;

#[tokio::test]
async fn health_endpoint_responds() -> Result<()> {
    let server = common::ensure_server().await?;
    let res = reqwest::get(format!("{}/health", server.base_url)).await?;

    // OK with a database, SERVICE_UNAVAILABLE without one
    let status = res.status();
    assert!(
        status == StatusCode::OK || status == StatusCode::SERVICE_UNAVAILABLE,
        "unexpected status: {}",
        status
    );

    let body = res.json::<serde_json::Value>().await?;
    assert!(body["data"]["timestamp"].is_string());
    assert_eq!(body["success"], status == StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn root_lists_endpoints() -> Result<()> {
    let server = common::ensure_server().await?;
    let body = reqwest::get(format!("{}/", server.base_url))
        .await?
        .json::<serde_json::Value>()
        .await?;

    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["name"], "WeClapp Manager");
    assert!(body["data"]["endpoints"]["tasks"].is_string());
    Ok(())
}

#[tokio::test]
async fn protected_routes_require_a_token() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    for path in ["/api/tasks", "/api/me", "/api/dashboard/stats", "/api/sync/status"] {
        let res = client.get(format!("{}{}", server.base_url, path)).send().await?;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "{}", path);
        let body = res.json::<serde_json::Value>().await?;
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "UNAUTHORIZED");
    }
    Ok(())
}

#[tokio::test]
async fn webhook_rejects_unsigned_payloads() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();
    let payload = r#"{"entityName":"task","entityId":"1","type":"updated"}"#;

    let unsigned = client
        .post(format!("{}/api/webhooks/weclapp", server.base_url))
        .header("content-type", "application/json")
        .body(payload)
        .send()
        .await?;
    assert_eq!(unsigned.status(), StatusCode::UNAUTHORIZED);

    let forged = client
        .post(format!("{}/api/webhooks/weclapp", server.base_url))
        .header("content-type", "application/json")
        .header("x-weclapp-signature", "sha256=00ff")
        .body(payload)
        .send()
        .await?;
    assert_eq!(forged.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

mod common;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use common::db::{self, TestDb};
use weclapp_manager::config::WeclappConfig;
use weclapp_manager::services::sync_service::{SyncEntity, SyncService};
use weclapp_manager::weclapp::WeclappClient;

type Tasks = Arc<Mutex<Vec<Value>>>;

/// WeClapp stand-in serving `/task` pages from a shared list
async fn mock_weclapp(tasks: Tasks) -> Result<String> {
    let app = Router::new()
        .route(
            "/webapi/v1/task",
            get(|State(tasks): State<Tasks>, Query(q): Query<HashMap<String, String>>| async move {
                let page: usize = q.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
                let size: usize = q.get("pageSize").and_then(|p| p.parse().ok()).unwrap_or(100);
                let all = tasks.lock().map(|t| t.clone()).unwrap_or_default();
                let items: Vec<Value> = all.into_iter().skip((page - 1) * size).take(size).collect();
                Json(json!({ "result": items }))
            }),
        )
        .with_state(tasks);

    let port = portpicker::pick_unused_port().expect("free port");
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Ok(format!("http://127.0.0.1:{}/webapi/v1", port))
}

async fn is_active(db: &TestDb, weclapp_id: &str) -> Result<bool> {
    Ok(sqlx::query_scalar("SELECT is_active FROM tasks WHERE weclapp_id = $1")
        .bind(weclapp_id)
        .fetch_one(&db.pool)
        .await?)
}

#[tokio::test]
async fn paged_sync_deactivates_tasks_gone_from_weclapp() -> Result<()> {
    let Some(db) = TestDb::connect().await? else { return Ok(()) };
    let run = db::suffix();
    let ids: Vec<String> = (1..=3).map(|i| format!("{}-{}", run, i)).collect();
    let tasks: Tasks = Arc::new(Mutex::new(
        ids.iter()
            .map(|id| json!({"id": id, "subject": format!("Task {}", id)}))
            .collect(),
    ));

    let client = WeclappClient::new(&WeclappConfig {
        base_url: mock_weclapp(tasks.clone()).await?,
        api_token: "sync-token".to_string(),
        webhook_secret: String::new(),
        page_size: 2,
        request_timeout_secs: 5,
    })?;
    let sync = SyncService::new(&db.pool, &client);

    let report = sync.sync(SyncEntity::Tasks).await?;
    assert_eq!((report.fetched, report.upserted, report.failed), (3, 3, 0));
    for id in &ids {
        assert!(is_active(&db, id).await?);
    }

    tasks.lock().unwrap().retain(|t| t["id"] != ids[1].as_str());
    let report = sync.sync(SyncEntity::Tasks).await?;
    assert_eq!(report.fetched, 2);
    assert!(report.deactivated >= 1);
    assert!(is_active(&db, &ids[0]).await?);
    assert!(!is_active(&db, &ids[1]).await?);
    assert!(is_active(&db, &ids[2]).await?);

    // a run with unmappable records leaves unseen rows alone
    {
        let mut list = tasks.lock().unwrap();
        list.retain(|t| t["id"] != ids[2].as_str());
        list.push(json!({"id": format!("{}-blank", run), "subject": ""}));
    }
    let report = sync.sync(SyncEntity::Tasks).await?;
    assert_eq!(report.failed, 1);
    assert_eq!(report.deactivated, 0);
    assert!(is_active(&db, &ids[2]).await?);
    Ok(())
}

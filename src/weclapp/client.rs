use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::debug;

use super::error::WeclappError;
use super::models::ResultEnvelope;
use crate::config::WeclappConfig;

pub const USER: &str = "user";
pub const TASK: &str = "task";
pub const SALES_ORDER: &str = "salesOrder";
pub const TIME_RECORD: &str = "timeRecord";
pub const PARTY: &str = "party";

/// Typed access to the WeClapp REST API (`/webapi/v1`)
#[derive(Debug, Clone)]
pub struct WeclappClient {
    http: reqwest::Client,
    base_url: String,
    has_token: bool,
    page_size: u32,
}

impl WeclappClient {
    /// Build the client. Missing credentials are reported on first use, not here,
    /// so the server can start without a WeClapp tenant.
    pub fn new(config: &WeclappConfig) -> Result<Self, WeclappError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let has_token = !config.api_token.trim().is_empty();
        if has_token {
            let token = HeaderValue::from_str(config.api_token.trim()).map_err(|_| WeclappError::InvalidToken)?;
            headers.insert("AuthenticationToken", token);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .gzip(true)
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            has_token,
            page_size: config.page_size.max(1),
        })
    }

    pub fn is_configured(&self) -> bool {
        !self.base_url.is_empty() && self.has_token
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, WeclappError> {
        if self.base_url.is_empty() {
            return Err(WeclappError::NotConfigured("WECLAPP_BASE_URL"));
        }
        if !self.has_token {
            return Err(WeclappError::NotConfigured("WECLAPP_API_TOKEN"));
        }
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        debug!("WeClapp {} {}", method, url);
        Ok(self.http.request(method, url))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T, WeclappError> {
        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(WeclappError::NotFound(what.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WeclappError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| WeclappError::Decode(format!("{}: {}", what, e)))
    }

    /// One page of a resource; pages are 1-based
    pub async fn list_page<T: DeserializeOwned>(
        &self,
        resource: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<T>, WeclappError> {
        let request = self.request(Method::GET, resource)?.query(&[
            ("page", page.to_string()),
            ("pageSize", page_size.to_string()),
            ("sort", "id".to_string()),
        ]);
        let envelope: ResultEnvelope<Vec<T>> = self.send(request, resource).await?;
        Ok(envelope.result)
    }

    pub async fn get<T: DeserializeOwned>(&self, resource: &str, id: &str) -> Result<T, WeclappError> {
        let request = self.request(Method::GET, &format!("{}/id/{}", resource, id))?;
        self.send(request, &format!("{} {}", resource, id)).await
    }

    pub async fn create<B: Serialize, T: DeserializeOwned>(&self, resource: &str, body: &B) -> Result<T, WeclappError> {
        let request = self.request(Method::POST, resource)?.json(body);
        self.send(request, resource).await
    }

    /// Partial update: properties missing from `body` keep their WeClapp values
    pub async fn update<B: Serialize, T: DeserializeOwned>(
        &self,
        resource: &str,
        id: &str,
        body: &B,
    ) -> Result<T, WeclappError> {
        let request = self
            .request(Method::PUT, &format!("{}/id/{}", resource, id))?
            .query(&[("ignoreMissingProperties", "true")])
            .json(body);
        self.send(request, &format!("{} {}", resource, id)).await
    }

    pub async fn delete(&self, resource: &str, id: &str) -> Result<(), WeclappError> {
        let response = self
            .request(Method::DELETE, &format!("{}/id/{}", resource, id))?
            .send()
            .await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(WeclappError::NotFound(format!("{} {}", resource, id)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WeclappError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weclapp::models::WeclappTask;
    use axum::{
        extract::{Path, Query},
        http::{HeaderMap as AxumHeaders, StatusCode as AxumStatus},
        routing::get,
        Json, Router,
    };
    use serde_json::{json, Value};
    use std::collections::HashMap;

    fn tasks() -> Vec<Value> {
        (1..=3)
            .map(|i| json!({"id": i.to_string(), "subject": format!("Task {}", i)}))
            .collect()
    }

    fn authorized(headers: &AxumHeaders) -> bool {
        headers.get("AuthenticationToken").and_then(|v| v.to_str().ok()) == Some("secret-token")
    }

    async fn mock_server() -> String {
        let app = Router::new()
            .route(
                "/webapi/v1/task",
                get(|headers: AxumHeaders, Query(q): Query<HashMap<String, String>>| async move {
                    if !authorized(&headers) {
                        return (AxumStatus::UNAUTHORIZED, Json(json!({"error": "unauthorized"})));
                    }
                    let page: usize = q.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
                    let size: usize = q.get("pageSize").and_then(|p| p.parse().ok()).unwrap_or(100);
                    let items: Vec<Value> = tasks().into_iter().skip((page - 1) * size).take(size).collect();
                    (AxumStatus::OK, Json(json!({ "result": items })))
                }),
            )
            .route(
                "/webapi/v1/task/id/:id",
                get(|Path(id): Path<String>| async move {
                    match tasks().into_iter().find(|t| t["id"] == id.as_str()) {
                        Some(task) => (AxumStatus::OK, Json(task)),
                        None => (AxumStatus::NOT_FOUND, Json(json!({"error": "not found"}))),
                    }
                })
                .put(|Path(id): Path<String>, Query(q): Query<HashMap<String, String>>, Json(mut body): Json<Value>| async move {
                    assert_eq!(q.get("ignoreMissingProperties").map(String::as_str), Some("true"));
                    body["id"] = json!(id);
                    Json(body)
                })
                .delete(|| async { AxumStatus::NO_CONTENT }),
            );

        let port = portpicker::pick_unused_port().expect("free port");
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await.unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://127.0.0.1:{}/webapi/v1", port)
    }

    fn client(base_url: String, token: &str) -> WeclappClient {
        WeclappClient::new(&WeclappConfig {
            base_url,
            api_token: token.to_string(),
            webhook_secret: String::new(),
            page_size: 2,
            request_timeout_secs: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn list_page_is_one_based() {
        let client = client(mock_server().await, "secret-token");
        let first: Vec<WeclappTask> = client.list_page(TASK, 1, client.page_size()).await.unwrap();
        let second: Vec<WeclappTask> = client.list_page(TASK, 2, client.page_size()).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].subject.as_deref(), Some("Task 3"));
    }

    #[tokio::test]
    async fn get_update_delete_single_entity() {
        let client = client(mock_server().await, "secret-token");
        let task: WeclappTask = client.get(TASK, "2").await.unwrap();
        assert_eq!(task.subject.as_deref(), Some("Task 2"));

        let missing = client.get::<WeclappTask>(TASK, "99").await;
        assert!(matches!(missing, Err(WeclappError::NotFound(_))));

        let updated: WeclappTask = client
            .update(TASK, "2", &json!({"subject": "Renamed"}))
            .await
            .unwrap();
        assert_eq!(updated.id, "2");
        assert_eq!(updated.subject.as_deref(), Some("Renamed"));

        client.delete(TASK, "2").await.unwrap();
    }

    #[tokio::test]
    async fn wrong_token_surfaces_status() {
        let client = client(mock_server().await, "wrong");
        let result = client.list_page::<Value>(TASK, 1, 10).await;
        assert!(matches!(result, Err(WeclappError::Status { status: 401, .. })));
    }

    #[tokio::test]
    async fn unconfigured_client_refuses_requests() {
        let client = client(String::new(), "");
        assert!(!client.is_configured());
        let result = client.list_page::<Value>(TASK, 1, 10).await;
        assert!(matches!(result, Err(WeclappError::NotConfigured("WECLAPP_BASE_URL"))));
    }
}

use serde_json::{json, Value};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use super::sync_service::{SyncEntity, SyncService};
use super::ServiceResult;
use crate::database::models::{webhook_log, WebhookLog};
use crate::database::DatabaseError;
use crate::webhook::{EventAction, WebhookEvent};
use crate::weclapp::WeclappClient;

#[derive(Debug, Clone, PartialEq)]
enum Outcome {
    Processed,
    Ignored(String),
    Failed(String),
}

/// Log-then-dispatch processing of verified webhook deliveries
pub struct WebhookService<'a> {
    pool: &'a PgPool,
    sync: SyncService<'a>,
}

impl<'a> WebhookService<'a> {
    pub fn new(pool: &'a PgPool, client: &'a WeclappClient) -> Self {
        Self {
            pool,
            sync: SyncService::new(pool, client),
        }
    }

    /// Record the raw delivery, then process it. Processing failures end up on
    /// the log row, not in the return value.
    pub async fn receive(&self, body: &[u8]) -> ServiceResult<WebhookLog> {
        let payload: Value = match serde_json::from_slice(body) {
            Ok(payload) => payload,
            Err(e) => {
                let raw = String::from_utf8_lossy(body).into_owned();
                let log = webhook_log::insert_received(self.pool, webhook_log::INVALID_EVENT, None, None, &json!({ "raw": raw }))
                    .await?;
                let reason = format!("payload is not valid JSON: {}", e);
                warn!("Webhook {} rejected: {}", log.id, reason);
                webhook_log::mark_outcome(self.pool, log.id, Some(&reason)).await?;
                return self.reload(log.id).await;
            }
        };

        let event = WebhookEvent::from_payload(&payload);
        let log = webhook_log::insert_received(
            self.pool,
            &event.event_type,
            event.entity_type(),
            event.entity_id.as_deref(),
            &payload,
        )
        .await?;
        info!("Webhook {} received: {} {:?}", log.id, event.event_type, event.entity_id);
        self.process(log.id, &event).await
    }

    /// Run a logged event again; bumps the attempt counter
    pub async fn retry(&self, id: Uuid) -> ServiceResult<WebhookLog> {
        let log = webhook_log::begin_retry(self.pool, id).await?;
        if log.event_type == webhook_log::INVALID_EVENT {
            webhook_log::mark_outcome(self.pool, log.id, Some("payload is not valid JSON")).await?;
            return self.reload(log.id).await;
        }
        let event = WebhookEvent::from_payload(&log.payload);
        info!("Webhook {} retry #{}: {}", log.id, log.attempts, event.event_type);
        self.process(log.id, &event).await
    }

    async fn process(&self, log_id: Uuid, event: &WebhookEvent) -> ServiceResult<WebhookLog> {
        match self.dispatch(event).await {
            Outcome::Processed => webhook_log::mark_outcome(self.pool, log_id, None).await?,
            Outcome::Ignored(note) => webhook_log::mark_ignored(self.pool, log_id, &note).await?,
            Outcome::Failed(reason) => {
                warn!("Webhook {} failed: {}", log_id, reason);
                webhook_log::mark_outcome(self.pool, log_id, Some(&reason)).await?
            }
        }
        self.reload(log_id).await
    }

    async fn dispatch(&self, event: &WebhookEvent) -> Outcome {
        let Some(kind) = event.entity else {
            return Outcome::Ignored(format!("ignored: no handler for {}", event.event_type));
        };
        let Some(weclapp_id) = event.entity_id.as_deref() else {
            return Outcome::Failed("event carries no entity id".to_string());
        };

        let entity = SyncEntity::from(kind);
        let result = match event.action {
            EventAction::Deleted => self.sync.remove(entity, weclapp_id).await.map(|_| ()),
            _ => self.sync.refresh(entity, weclapp_id).await,
        };
        match result {
            Ok(()) => Outcome::Processed,
            Err(e) => Outcome::Failed(e.to_string()),
        }
    }

    async fn reload(&self, id: Uuid) -> ServiceResult<WebhookLog> {
        let log = webhook_log::find_by_id(self.pool, id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("webhook log {} not found", id)))?;
        Ok(log)
    }
}

use axum::{body::Bytes, extract::State, http::HeaderMap};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::webhook_service::WebhookService;
use crate::state::AppState;
use crate::webhook::{signature, SIGNATURE_HEADER};

/// POST /api/webhooks/weclapp - Receive a WeClapp event
///
/// The signature is checked against the raw body before anything is parsed.
/// Once the event is logged the response is 200 whatever the processing
/// outcome; the log row carries the result.
pub async fn receive(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> ApiResult<Value> {
    let header = match headers.get(SIGNATURE_HEADER) {
        None => None,
        Some(value) => Some(value.to_str().map_err(|_| ApiError::from(signature::SignatureError::Malformed))?),
    };
    if let Err(e) = signature::verify(&state.config.weclapp.webhook_secret, header, &body) {
        tracing::warn!("Webhook rejected: {}", e);
        return Err(e.into());
    }

    let log = WebhookService::new(&state.pool, &state.weclapp).receive(&body).await?;
    Ok(ApiResponse::success(json!({
        "id": log.id,
        "event_type": log.event_type,
        "status": log.status,
    })))
}

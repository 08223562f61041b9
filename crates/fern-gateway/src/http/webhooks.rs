//! `POST /webhooks/{channel}` — generic inbound transport webhook.
//!
//! A real deployment would have one parser per transport (Telegram update,
//! Twilio form-encoded SMS, …); those adapters are out of scope here (see
//! [`fern_channels::adapters`]). This endpoint accepts whatever JSON body the
//! transport sends, acks immediately, and dispatches the turn in the
//! background so the ack always lands inside the transport's budget.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use tracing::{info, warn};

use fern_backend::RunTurnInput;

use crate::app::AppState;

type HmacSha256 = Hmac<Sha256>;

pub async fn webhook_handler(
    State(state): State<Arc<AppState>>,
    Path(channel): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    if let Some(secret) = state.config.webhook_url.as_deref() {
        if let Err(reason) = verify_signature(&headers, &body, secret) {
            warn!(%channel, %reason, "webhook signature verification failed");
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "signature verification failed" })),
            ));
        }
    }

    let payload: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let channel_user_id = payload
        .get("from")
        .or_else(|| payload.get("channelUserId"))
        .and_then(Value::as_str)
        .map(str::to_string);

    let message = payload
        .get("message")
        .or_else(|| payload.get("text"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| payload.to_string());

    let thread_id = match &channel_user_id {
        Some(user) => format!("webhook_{channel}_{user}"),
        None => format!("webhook_{channel}"),
    };

    info!(%channel, thread_id = %thread_id, "webhook accepted, dispatching turn in background");

    let coordinator = Arc::clone(&state.coordinator);
    tokio::spawn(async move {
        coordinator
            .run_turn(RunTurnInput {
                thread_id,
                message,
                channel: Some(channel),
                channel_user_id,
                attachments: Vec::new(),
                agent_type: None,
            })
            .await;
    });

    Ok((StatusCode::ACCEPTED, Json(json!({}))))
}

/// `X-Fern-Signature: sha256=<hex>`, HMAC-SHA256 over the raw body, keyed by
/// the configured webhook secret.
fn verify_signature(headers: &HeaderMap, body: &Bytes, secret: &str) -> Result<(), String> {
    let header = headers
        .get("x-fern-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| "missing X-Fern-Signature header".to_string())?;

    let hex_sig = header
        .strip_prefix("sha256=")
        .ok_or_else(|| "malformed X-Fern-Signature header".to_string())?;

    let expected = hex::decode(hex_sig).map_err(|_| "X-Fern-Signature is not valid hex".to_string())?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| "invalid HMAC key length".to_string())?;
    mac.update(body);
    mac.verify_slice(&expected).map_err(|_| "signature mismatch".to_string())
}

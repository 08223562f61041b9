//! `/internal/channel/send` — deliver a message through a registered
//! channel adapter.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::error::{channel_error, ApiError};

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub channel: String,
    pub to: String,
    pub content: String,
}

pub async fn send_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SendRequest>,
) -> Result<Json<Value>, ApiError> {
    state
        .channels
        .send(&req.channel, &req.to, &req.content)
        .await
        .map_err(channel_error)?;

    Ok(Json(json!({ "sent": true })))
}

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::app::AppState;

/// `GET /health` — unauthenticated liveness probe.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let channels: Vec<Value> = state
        .channels
        .statuses()
        .into_iter()
        .map(|(name, status)| json!({ "name": name, "status": format!("{status:?}") }))
        .collect();

    Json(json!({
        "status": "ok",
        "channels": channels,
    }))
}

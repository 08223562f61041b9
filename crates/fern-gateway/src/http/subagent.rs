//! `/internal/subagent/*` — spawn, poll (optionally blocking), and cancel
//! background subagent tasks.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use fern_subagent::{SpawnTaskInput, SubagentType};

use crate::app::AppState;
use crate::error::{subagent_error, ApiError};

#[derive(Debug, Deserialize)]
pub struct SpawnRequest {
    #[serde(rename = "type")]
    pub task_type: SubagentType,
    pub prompt: String,
    pub description: String,
    #[serde(rename = "parentSessionId")]
    pub parent_session_id: Option<String>,
    pub metadata: Option<Value>,
}

pub async fn spawn_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SpawnRequest>,
) -> Result<Json<Value>, ApiError> {
    let task = state
        .subagent
        .spawn_task(SpawnTaskInput {
            task_type: req.task_type,
            prompt: req.prompt,
            description: req.description,
            parent_session_id: req.parent_session_id,
            metadata: req.metadata,
        })
        .await
        .map_err(subagent_error)?;

    Ok(Json(serde_json::to_value(task).unwrap()))
}

#[derive(Debug, Deserialize)]
pub struct GetQuery {
    #[serde(default)]
    pub wait: bool,
    pub timeout: Option<u64>,
}

pub async fn get_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<GetQuery>,
) -> Result<Json<Value>, ApiError> {
    let timeout = query.timeout.map(Duration::from_millis);
    let task = state
        .subagent
        .get_task(&id, query.wait, timeout)
        .await
        .map_err(subagent_error)?;

    Ok(Json(serde_json::to_value(task).unwrap()))
}

pub async fn cancel_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.subagent.cancel_task(&id).await.map_err(subagent_error)?;
    Ok(Json(json!({ "cancelled": true })))
}

//! `/internal/tasks/*` — thread-scoped checklists the agent can read and
//! mutate mid-conversation, backed by [`fern_sessions::TodoManager`].

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use fern_core::ids::TodoId;
use fern_sessions::TodoStatus;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::error::{session_error, ApiError};

#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    #[serde(rename = "threadId")]
    pub thread_id: String,
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "sortOrder")]
    pub sort_order: Option<i64>,
}

pub async fn create_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateRequest>,
) -> Result<Json<Value>, ApiError> {
    let task = state
        .todos
        .create(&req.thread_id, &req.title, req.description.as_deref(), req.sort_order)
        .map_err(session_error)?;
    Ok(Json(serde_json::to_value(task).unwrap()))
}

#[derive(Debug, Deserialize)]
pub struct ListRequest {
    #[serde(rename = "threadId")]
    pub thread_id: String,
}

pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ListRequest>,
) -> Result<Json<Value>, ApiError> {
    let tasks = state.todos.list(&req.thread_id).map_err(session_error)?;
    Ok(Json(serde_json::to_value(tasks).unwrap()))
}

#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    pub status: Option<TodoStatus>,
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "sortOrder")]
    pub sort_order: Option<i64>,
}

pub async fn update_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateRequest>,
) -> Result<Json<Value>, ApiError> {
    let task_id = TodoId::from(id);
    let task = state
        .todos
        .update(
            &task_id,
            req.status,
            req.title.as_deref(),
            req.description.as_deref(),
            req.sort_order,
        )
        .map_err(session_error)?;

    let tasks = state.todos.list(&task.thread_id).map_err(session_error)?;

    Ok(Json(json!({ "task": task, "tasks": tasks })))
}

#[derive(Debug, Deserialize)]
pub struct NextQuery {
    #[serde(rename = "threadId")]
    pub thread_id: String,
}

pub async fn next_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NextQuery>,
) -> Result<Json<Value>, ApiError> {
    let task = state.todos.next(&query.thread_id).map_err(session_error)?;
    Ok(Json(json!({ "task": task })))
}

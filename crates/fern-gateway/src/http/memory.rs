//! `/internal/memory/*` — persistent-memory writes and hybrid retrieval.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use fern_memory::{MemoryType, WriteMemoryInput};

use crate::app::AppState;
use crate::error::{memory_error, ApiError};

#[derive(Debug, Deserialize)]
pub struct WriteRequest {
    #[serde(rename = "type")]
    pub memory_type: MemoryType,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

pub async fn write_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<WriteRequest>,
) -> Result<Json<Value>, ApiError> {
    let memory = state
        .memory
        .write_memory(WriteMemoryInput {
            memory_type: req.memory_type,
            content: req.content,
            tags: req.tags,
        })
        .await
        .map_err(memory_error)?;

    Ok(Json(serde_json::to_value(memory).unwrap()))
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub limit: Option<usize>,
    #[serde(rename = "threadId")]
    pub thread_id: Option<String>,
}

pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<Value>, ApiError> {
    let results = state
        .memory
        .search(&req.query, req.limit, req.thread_id.as_deref())
        .await
        .map_err(memory_error)?;

    Ok(Json(serde_json::to_value(results).unwrap()))
}

#[derive(Debug, Deserialize)]
pub struct ReadRequest {
    #[serde(rename = "threadId")]
    pub thread_id: String,
    #[serde(rename = "chunkId")]
    pub chunk_id: String,
}

pub async fn read_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ReadRequest>,
) -> Result<Json<Value>, ApiError> {
    let chunk = state
        .memory
        .read_chunk(&req.thread_id, &req.chunk_id)
        .await
        .map_err(memory_error)?;

    match chunk {
        Some(chunk) => Ok(Json(serde_json::to_value(chunk).unwrap())),
        None => Err(crate::error::api_error(
            axum::http::StatusCode::NOT_FOUND,
            "memory chunk not found",
        )),
    }
}

pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let deleted = state.memory.delete_memory(&id).await.map_err(memory_error)?;
    Ok(Json(json!({ "deleted": deleted })))
}

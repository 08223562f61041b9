//! `/internal/scheduler/*` — scheduled-job CRUD, backed by [`fern_scheduler`].

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use fern_scheduler::{CreateJobInput, JobStatus, ScheduleSpec};

use crate::app::AppState;
use crate::error::{api_error, scheduler_error, ApiError};

#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    pub prompt: String,
    #[serde(rename = "scheduledAt")]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(rename = "delayMs")]
    pub delay_ms: Option<i64>,
    #[serde(rename = "cronExpr")]
    pub cron_expr: Option<String>,
    pub metadata: Option<Value>,
}

pub async fn create_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateRequest>,
) -> Result<Json<Value>, ApiError> {
    let options = [
        req.scheduled_at.is_some(),
        req.delay_ms.is_some(),
        req.cron_expr.is_some(),
    ]
    .iter()
    .filter(|present| **present)
    .count();

    if options != 1 {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "exactly one of scheduledAt, delayMs, or cronExpr must be supplied",
        ));
    }

    let schedule = if let Some(at) = req.scheduled_at {
        ScheduleSpec::At(at)
    } else if let Some(ms) = req.delay_ms {
        ScheduleSpec::DelayMs(ms)
    } else {
        ScheduleSpec::Cron(req.cron_expr.unwrap())
    };

    let job = state
        .scheduler
        .create(CreateJobInput {
            prompt: req.prompt,
            schedule,
            metadata: req.metadata,
        })
        .await
        .map_err(scheduler_error)?;

    Ok(Json(serde_json::to_value(job).unwrap()))
}

#[derive(Debug, Deserialize)]
pub struct ListRequest {
    pub status: Option<JobStatus>,
    pub limit: Option<i64>,
}

pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ListRequest>,
) -> Result<Json<Value>, ApiError> {
    let jobs = state
        .scheduler
        .list(req.status, req.limit)
        .await
        .map_err(scheduler_error)?;
    Ok(Json(serde_json::to_value(jobs).unwrap()))
}

pub async fn get_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let job = state.scheduler.get(&id).await.map_err(scheduler_error)?;
    Ok(Json(serde_json::to_value(job).unwrap()))
}

pub async fn cancel_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.scheduler.cancel(&id).await.map_err(scheduler_error)?;
    Ok(Json(json!({ "cancelled": true })))
}

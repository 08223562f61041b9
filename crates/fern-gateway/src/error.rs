//! Maps each subsystem's own error type onto the shared HTTP response shape:
//! `{ "error": "<message>" }` plus a status code, per the taxonomy every
//! crate's errors are drawn from (validation → 400, not-found → 404,
//! conflict → 400, timeout → 504, backend-unhealthy / rate-limit → 502,
//! everything else → 500).

use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

pub type ApiError = (StatusCode, Json<Value>);

pub fn api_error(status: StatusCode, message: impl std::fmt::Display) -> ApiError {
    (status, Json(json!({ "success": false, "error": message.to_string() })))
}

pub fn memory_error(err: fern_memory::MemoryError) -> ApiError {
    use fern_memory::MemoryError as E;
    match err {
        E::NotFound { .. } => api_error(StatusCode::NOT_FOUND, err),
        E::Validation(_) => api_error(StatusCode::BAD_REQUEST, err),
        E::Database(_) | E::Serialization(_) => api_error(StatusCode::INTERNAL_SERVER_ERROR, err),
        E::Backend(_) => api_error(StatusCode::BAD_GATEWAY, err),
    }
}

pub fn scheduler_error(err: fern_scheduler::SchedulerError) -> ApiError {
    use fern_scheduler::SchedulerError as E;
    match err {
        E::JobNotFound { .. } => api_error(StatusCode::NOT_FOUND, err),
        E::InvalidSchedule(_) | E::NotCancellable { .. } => api_error(StatusCode::BAD_REQUEST, err),
        E::Database(_) | E::Serialization(_) => api_error(StatusCode::INTERNAL_SERVER_ERROR, err),
    }
}

pub fn subagent_error(err: fern_subagent::SubagentError) -> ApiError {
    use fern_subagent::SubagentError as E;
    match err {
        E::NotFound { .. } => api_error(StatusCode::NOT_FOUND, err),
        E::Validation(_) | E::NotCancellable { .. } => api_error(StatusCode::BAD_REQUEST, err),
        E::Database(_) | E::Serialization(_) => api_error(StatusCode::INTERNAL_SERVER_ERROR, err),
    }
}

pub fn channel_error(err: fern_channels::ChannelError) -> ApiError {
    use fern_channels::ChannelError as E;
    match err {
        E::NotFound(_) => api_error(StatusCode::NOT_FOUND, err),
        E::Timeout { .. } => api_error(StatusCode::GATEWAY_TIMEOUT, err),
        E::ConnectionFailed(_) | E::SendFailed(_) | E::AuthFailed(_) | E::ConfigError(_) => {
            api_error(StatusCode::INTERNAL_SERVER_ERROR, err)
        }
    }
}

pub fn session_error(err: fern_sessions::SessionError) -> ApiError {
    use fern_sessions::SessionError as E;
    match err {
        E::NotFound { .. } => api_error(StatusCode::NOT_FOUND, err),
        E::Validation(_) => api_error(StatusCode::BAD_REQUEST, err),
        E::Database(_) => api_error(StatusCode::INTERNAL_SERVER_ERROR, err),
    }
}

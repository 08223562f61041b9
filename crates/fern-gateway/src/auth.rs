//! Shared-secret guard for the internal API surface.
//!
//! Every `/api/*` and `/internal/*` route is gated behind an
//! `X-Fern-Secret` header check. With no secret configured, the guard is a
//! no-op — the intended posture for local development, not production.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::app::AppState;

const SECRET_HEADER: &str = "x-fern-secret";

pub async fn require_secret(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(expected) = state.config.api_secret.as_deref() else {
        return next.run(req).await;
    };

    let provided = req
        .headers()
        .get(SECRET_HEADER)
        .and_then(|v| v.to_str().ok());

    match provided {
        Some(secret) if secret == expected => next.run(req).await,
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "success": false, "error": "missing or invalid X-Fern-Secret header" })),
        )
            .into_response(),
    }
}

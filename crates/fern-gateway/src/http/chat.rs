//! `POST /api/chat` — the direct-to-agent entry point used by anything that
//! isn't a channel webhook: local scripting, tests, a thin first-party UI.
//!
//! Request:  `{"message": "...", "context": {"threadId": "...", "channel": "...", "channelUserId": "..."}}`
//! Response: `{"success": true, "sessionId": "..."}` or `{"success": false, "error": "..."}`
//!
//! `context` is entirely optional. Without a `threadId`, a fresh one is
//! minted per call — callers that want a continuing conversation supply the
//! `sessionId` they got back as the next call's `context.threadId`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use fern_backend::RunTurnInput;

use crate::app::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatContext {
    #[serde(rename = "threadId")]
    pub thread_id: Option<String>,
    pub channel: Option<String>,
    #[serde(rename = "channelUserId")]
    pub channel_user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub context: Option<ChatContext>,
}

#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub success: bool,
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatReply>, (StatusCode, Json<Value>)> {
    if req.message.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": "message must not be empty" })),
        ));
    }

    let context = req.context.unwrap_or(ChatContext {
        thread_id: None,
        channel: None,
        channel_user_id: None,
    });
    let thread_id = context
        .thread_id
        .unwrap_or_else(|| format!("api_{}", Uuid::new_v4()));

    let output = state
        .coordinator
        .run_turn(RunTurnInput {
            thread_id,
            message: req.message,
            channel: context.channel,
            channel_user_id: context.channel_user_id,
            attachments: Vec::new(),
            agent_type: None,
        })
        .await;

    Ok(Json(ChatReply {
        success: true,
        session_id: output.thread_id,
    }))
}

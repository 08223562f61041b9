use serde::{Deserialize, Serialize};

/// Raw event shape emitted by the backend's event stream. Field names match
/// what a `subscribeEvents` consumer actually receives; translation into a
/// [`ProgressEvent`] happens in `events::translate`.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub session_id: Option<String>,
    pub tool: Option<String>,
    pub message: Option<String>,
}

/// Neutral progress stream the session coordinator consumes, decoupled from
/// whatever wire shape the backend actually speaks.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    ToolStart { tool: String },
    ToolComplete { tool: String, message: Option<String> },
    ToolError { tool: String, message: Option<String> },
    Text { message: String },
    Thinking { message: String },
    SessionStatus { message: Option<String> },
    SessionIdle,
    SessionError { message: Option<String> },
}

/// One recorded tool invocation for a single turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub tool: String,
    pub input: serde_json::Value,
    pub output: Option<String>,
}

/// Image attachment on an inbound message. Non-image attachments are
/// dropped before reaching the backend (spec: "other attachments are
/// dropped at this layer").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub mime_type: String,
    pub data_base64: String,
}

/// A single part of a prompt submitted to the backend — text first, then
/// any image parts.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PromptPart {
    Text { text: String },
    Image { mime_type: String, data_base64: String },
}

#[derive(Debug, Clone)]
pub struct RunTurnInput {
    pub thread_id: String,
    pub message: String,
    pub channel: Option<String>,
    pub channel_user_id: Option<String>,
    pub attachments: Vec<Attachment>,
    pub agent_type: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunTurnOutput {
    pub thread_id: String,
    pub response: String,
    pub tool_calls: Vec<ToolCallRecord>,
}

/// A tool definition as reported by `listTools`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
}

/// One message as stored in the backend session's transcript.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendMessage {
    pub id: String,
    pub role: String,
    pub text: String,
    pub created_at: String,
}

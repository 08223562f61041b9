use fern_core::ids::TodoId;
use serde::{Deserialize, Serialize};

/// Maps a stable thread identifier to an LLM-backend session identifier.
/// Lives entirely in memory — on restart every `ThreadSession` is gone and
/// the next turn for that thread simply creates a fresh backend session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadSession {
    pub thread_id: String,
    pub backend_session_id: String,
    pub share_url: Option<String>,
    /// Monotonic creation instant, seconds since `UNIX_EPOCH`, for TTL checks.
    pub created_at_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Pending,
    InProgress,
    Done,
    Cancelled,
}

impl std::fmt::Display for TodoStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TodoStatus::Pending => "pending",
            TodoStatus::InProgress => "in_progress",
            TodoStatus::Done => "done",
            TodoStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for TodoStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TodoStatus::Pending),
            "in_progress" => Ok(TodoStatus::InProgress),
            "done" => Ok(TodoStatus::Done),
            "cancelled" => Ok(TodoStatus::Cancelled),
            other => Err(format!("unknown todo status: {other}")),
        }
    }
}

/// Agent-visible checklist item attached to a thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoTask {
    pub id: TodoId,
    pub thread_id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: TodoStatus,
    pub sort_order: i64,
    pub created_at: String,
    pub updated_at: String,
}

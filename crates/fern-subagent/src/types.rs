use fern_core::ids::TaskId;
use serde::{Deserialize, Serialize};

/// The three read-only subagent specializations. Each carries its own
/// tool allowlist and step cap, handed to the backend as the `agent`
/// override on `prompt()` plus restated as a directive in the task prompt
/// (the backend is the only thing that can actually enforce tool access;
/// Fern documents the contract and trusts it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubagentType {
    Explore,
    Research,
    Plan,
}

impl SubagentType {
    pub fn allowed_tools(&self) -> &'static [&'static str] {
        match self {
            SubagentType::Explore => &["read", "grep", "glob", "bash"],
            SubagentType::Research => &["read", "grep", "glob", "webfetch"],
            SubagentType::Plan => &["read", "grep", "glob"],
        }
    }

    pub fn max_steps(&self) -> u32 {
        match self {
            SubagentType::Explore => 30,
            SubagentType::Research => 40,
            SubagentType::Plan => 50,
        }
    }

    /// Appended to the task prompt to steer the subagent toward the
    /// expected output shape for its specialization.
    pub fn directive(&self) -> &'static str {
        match self {
            SubagentType::Explore => {
                "You may only use read, grep, glob, and bash. Find files, report concisely."
            }
            SubagentType::Research => {
                "You may only use read, grep, glob, and webfetch. No edits, no shell commands."
            }
            SubagentType::Plan => {
                "You may only use read, grep, and glob. Produce no side effects; emit an \
                 ordered step list with file paths."
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubagentType::Explore => "explore",
            SubagentType::Research => "research",
            SubagentType::Plan => "plan",
        }
    }
}

impl std::str::FromStr for SubagentType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "explore" => Ok(SubagentType::Explore),
            "research" => Ok(SubagentType::Research),
            "plan" => Ok(SubagentType::Plan),
            other => Err(format!("unknown subagent type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubagentStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl SubagentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SubagentStatus::Completed | SubagentStatus::Failed | SubagentStatus::Cancelled
        )
    }
}

impl std::fmt::Display for SubagentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SubagentStatus::Pending => "pending",
            SubagentStatus::Running => "running",
            SubagentStatus::Completed => "completed",
            SubagentStatus::Failed => "failed",
            SubagentStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for SubagentStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SubagentStatus::Pending),
            "running" => Ok(SubagentStatus::Running),
            "completed" => Ok(SubagentStatus::Completed),
            "failed" => Ok(SubagentStatus::Failed),
            "cancelled" => Ok(SubagentStatus::Cancelled),
            other => Err(format!("unknown subagent status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubagentTask {
    pub id: TaskId,
    #[serde(rename = "type")]
    pub task_type: SubagentType,
    pub status: SubagentStatus,
    pub prompt: String,
    pub description: String,
    pub parent_session_id: Option<String>,
    pub metadata: serde_json::Value,
    pub result: Option<String>,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SpawnTaskInput {
    pub task_type: SubagentType,
    pub prompt: String,
    pub description: String,
    pub parent_session_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

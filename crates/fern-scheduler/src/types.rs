use chrono::{DateTime, Utc};
use fern_core::ids::JobId;
use serde::{Deserialize, Serialize};

/// How a job is re-armed after it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Fires once and is then `completed`.
    OneShot,
    /// Re-scheduled from its cron expression after every fire.
    Recurring,
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobKind::OneShot => "one_shot",
            JobKind::Recurring => "recurring",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "one_shot" => Ok(JobKind::OneShot),
            "recurring" => Ok(JobKind::Recurring),
            other => Err(format!("unknown job type: {other}")),
        }
    }
}

/// Lifecycle state of a scheduled job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for `scheduled_at`.
    Pending,
    /// Claimed by a dispatcher tick and running.
    Running,
    /// Ran to completion (`one_shot` only — `recurring` jobs cycle back to `Pending`).
    Completed,
    /// Last run's turn reported an error.
    Failed,
    /// Cancelled by the caller while still `Pending`.
    Cancelled,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// The one scheduling option a caller supplied to `create`.
#[derive(Debug, Clone)]
pub enum ScheduleSpec {
    /// Fire once at this absolute instant.
    At(DateTime<Utc>),
    /// Fire once, `delay_ms` milliseconds from now.
    DelayMs(i64),
    /// Fire repeatedly per a standard 5-field cron expression.
    Cron(String),
}

/// Input to [`crate::engine::SchedulerHandle::create`].
#[derive(Debug, Clone)]
pub struct CreateJobInput {
    pub prompt: String,
    pub schedule: ScheduleSpec,
    pub metadata: Option<serde_json::Value>,
}

/// A persisted scheduled job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledJob {
    pub id: JobId,
    #[serde(rename = "type")]
    pub job_type: JobKind,
    pub status: JobStatus,
    pub prompt: String,
    /// Next (or, once fired, most recent) instant this job is due.
    pub scheduled_at: DateTime<Utc>,
    /// Present only for `Recurring` jobs.
    pub cron_expr: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: String,
    pub updated_at: String,
    pub last_fired_at: Option<String>,
    pub last_error: Option<String>,
}

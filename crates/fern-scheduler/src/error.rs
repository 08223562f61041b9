use thiserror::Error;

/// Errors that can occur within the scheduler subsystem.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Underlying SQLite / rusqlite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The provided schedule definition is invalid (bad cron expression, or
    /// more than one of `at` / `delay_ms` / `cron_expr` supplied).
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    /// No job with the given ID exists in the store.
    #[error("Job not found: {id}")]
    JobNotFound { id: String },

    /// Cancellation was attempted on a job that is no longer `pending`.
    #[error("Job {id} cannot be cancelled (status: {status})")]
    NotCancellable { id: String, status: String },

    /// Row returned a status or schedule payload that doesn't parse.
    #[error("Corrupt job row: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SubagentError {
    #[error("subagent task not found: {id}")]
    NotFound { id: String },

    #[error("task {id} is already {status} and cannot be cancelled")]
    NotCancellable { id: String, status: String },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SubagentError>;

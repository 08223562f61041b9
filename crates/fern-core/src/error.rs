use thiserror::Error;

/// Error taxonomy shared by every subsystem. Variants map directly onto the
/// kinds a caller needs to branch on (HTTP status, retry policy) rather than
/// onto implementation detail.
#[derive(Debug, Error)]
pub enum FernError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("timeout after {ms}ms")]
    Timeout { ms: u64 },

    #[error("backend unhealthy: {0}")]
    BackendUnhealthy(String),

    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimit { retry_after_ms: u64 },

    #[error("fatal: {0}")]
    Fatal(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl FernError {
    /// Short code used in HTTP responses and log fields.
    pub fn code(&self) -> &'static str {
        match self {
            FernError::Validation(_) => "VALIDATION",
            FernError::NotFound(_) => "NOT_FOUND",
            FernError::Conflict(_) => "CONFLICT",
            FernError::Timeout { .. } => "TIMEOUT",
            FernError::BackendUnhealthy(_) => "BACKEND_UNHEALTHY",
            FernError::RateLimit { .. } => "RATE_LIMIT",
            FernError::Fatal(_) => "FATAL",
            FernError::Database(_) => "DATABASE_ERROR",
            FernError::Serialization(_) => "SERIALIZATION_ERROR",
            FernError::Io(_) => "IO_ERROR",
            FernError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        FernError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        FernError::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        FernError::Conflict(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, FernError>;

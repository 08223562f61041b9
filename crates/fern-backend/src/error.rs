use thiserror::Error;

/// Errors surfaced by the LLM backend adapter. Distinct from `FernError`
/// because most of these carry retry semantics the caller needs to see —
/// they get folded into a `FernError::BackendUnhealthy` at the turn level.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP error talking to backend: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("failed to parse backend response: {0}")]
    Parse(String),

    #[error("no free port found in 4096..=4300 after {attempts} attempts")]
    NoFreePort { attempts: u32 },

    #[error("backend process failed to become ready: {0}")]
    StartupFailed(String),

    #[error("share_session failed after {attempts} attempts: {last_error}")]
    ShareFailed { attempts: u32, last_error: String },

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, BackendError>;

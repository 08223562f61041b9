use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("todo task not found: {id}")]
    NotFound { id: String },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, SessionError>;

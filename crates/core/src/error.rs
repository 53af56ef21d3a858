//! Error types for the ES4C core crate.

use thiserror::Error;

/// Top-level error type for all ES4C operations.
#[derive(Debug, Error)]
pub enum Es4cError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("queue error: {0}")]
    Queue(String),

    #[error("directory error: {0}")]
    Directory(String),

    #[error("mail error: {0}")]
    Mail(String),

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("template error: {0}")]
    Template(String),
}

impl From<serde_json::Error> for Es4cError {
    fn from(e: serde_json::Error) -> Self {
        Es4cError::Serialization(e.to_string())
    }
}

/// A convenience Result alias that defaults to [`Es4cError`].
pub type Result<T> = std::result::Result<T, Es4cError>;

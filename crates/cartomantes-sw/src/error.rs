//! Error types for the worker.

use thiserror::Error;

/// Result type alias for worker operations.
pub type SwResult<T> = Result<T, SwError>;

/// Errors raised by worker handlers and host seams.
///
/// None of these ever leaves [`crate::OfflineWorker::dispatch`]; they are logged
/// there and the event degrades to its fallback.
#[derive(Error, Debug)]
pub enum SwError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Client error: {0}")]
    Client(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl SwError {
    /// Create a new network error
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create a new client error
    pub fn client(msg: impl Into<String>) -> Self {
        Self::Client(msg.into())
    }

    /// Create a new notification error
    pub fn notification(msg: impl Into<String>) -> Self {
        Self::Notification(msg.into())
    }
}

/// Errors raised while loading or validating [`crate::WorkerConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid scope URL: {0}")]
    Scope(#[from] url::ParseError),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

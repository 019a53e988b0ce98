use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("No home directory")]
    NoHomeDir,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid workflow: {}", .0.join("; "))]
    InvalidWorkflow(Vec<String>),

    #[error("Circular dependency detected involving task {task}")]
    CircularDependency { task: String },

    #[error("Unknown task kind '{kind}' for task {task}")]
    UnknownTaskKind { task: String, kind: String },

    #[error("Unsupported workflow file format: {0}")]
    UnsupportedFormat(String),

    #[error("Agent dispatch failed: {0}")]
    Dispatch(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session already active: {0}")]
    SessionActive(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Agent concurrency limiter closed for {0}")]
    LimiterClosed(String),
}

pub type Result<T> = std::result::Result<T, Error>;

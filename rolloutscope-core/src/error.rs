//! Error types for rolloutscope-core

use thiserror::Error;

/// Main error type for the rolloutscope-core library
///
/// Only whole-operation failures are represented here. A malformed rollout
/// line is never an error: it is skipped and counted in a
/// [`ReadReport`](crate::ingest::ReadReport).
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error for a rollout file as a whole
    #[error("parse error in {path}: {message}")]
    Parse { path: String, message: String },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// A background parse task panicked or was cancelled
    #[error("task error: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Task(err.to_string())
    }
}

/// Result type alias for rolloutscope-core
pub type Result<T> = std::result::Result<T, Error>;

//! Error types for the Aider adapter

use chatwire_application::ports::aider_connector::ConnectorError;
use thiserror::Error;

/// Result type alias for Aider process operations
pub type Result<T> = std::result::Result<T, AiderError>;

#[derive(Error, Debug)]
pub enum AiderError {
    #[error("Aider command not found: {0}")]
    CommandNotFound(String),

    #[error("Failed to spawn Aider process: {0}")]
    SpawnError(#[from] std::io::Error),

    #[error("Failed to capture Aider {0}")]
    MissingPipe(&'static str),

    #[error("Invalid stderr pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Aider did not print its banner within {0} seconds")]
    StartTimeout(u64),

    #[error("Aider process has exited (code: {0:?})")]
    ProcessExited(Option<i32>),

    #[error("Write to Aider failed: {0}")]
    WriteFailed(std::io::Error),
}

impl From<AiderError> for ConnectorError {
    fn from(e: AiderError) -> Self {
        match e {
            AiderError::StartTimeout(secs) => ConnectorError::StartTimeout(secs),
            AiderError::ProcessExited(code) => ConnectorError::ProcessExited(code),
            AiderError::WriteFailed(e) => ConnectorError::Write(e.to_string()),
            other => ConnectorError::StartFailed(other.to_string()),
        }
    }
}

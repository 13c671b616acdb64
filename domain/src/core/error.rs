//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    #[error("No chat agent available")]
    NoAgentAvailable,

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl DomainError {
    /// Check if this error represents a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DomainError::Cancelled)
    }
}

/// Errors raised when mutating a [`ChatResponseModel`](crate::chat::response::ChatResponseModel).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResponseError {
    /// Content arrived after the response reached a terminal state.
    #[error("Response {0} is already complete")]
    Closed(String),

    #[error("No progress message with id {0}")]
    UnknownProgressMessage(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_error_display() {
        let error = DomainError::Cancelled;
        assert_eq!(error.to_string(), "Operation cancelled");
    }

    #[test]
    fn test_is_cancelled_check() {
        assert!(DomainError::Cancelled.is_cancelled());
        assert!(!DomainError::NoAgentAvailable.is_cancelled());
        assert!(!DomainError::UnknownAgent("Coding".to_string()).is_cancelled());
    }

    #[test]
    fn closed_response_error_names_response() {
        let error = ResponseError::Closed("abc".to_string());
        assert_eq!(error.to_string(), "Response abc is already complete");
    }
}

//! Chat agents
//!
//! A [`ChatAgent`] answers one request at a time by filling the request's
//! response model. The agent owns the response lifecycle: it must call
//! `complete()` or `cancel()` on the response before (or when) `invoke`
//! returns successfully. On error, the dispatcher cancels the response.

pub mod aider;
pub mod coding;
pub mod command;
pub mod delegating;
pub mod registry;

use crate::ports::aider_connector::ConnectorError;
use crate::ports::language_model::GatewayError;
use async_trait::async_trait;
use chatwire_domain::{
    AgentDescriptor, ChatRequestModel, ChatSession, DomainError, ResponseError,
};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub use aider::{AIDER_AGENT_ID, AiderChatAgent};
pub use coding::{CODING_AGENT_ID, CodingChatAgent};
pub use command::{COMMAND_AGENT_ID, CommandChatAgent};
pub use delegating::{DELEGATING_AGENT_ID, DelegatingChatAgent};
pub use registry::ChatAgentService;

/// Errors that can occur while an agent answers a request
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    #[error("No language model available for purpose '{0}'")]
    NoLanguageModel(String),

    #[error("Could not parse model reply: {0}")]
    Parse(#[from] DomainError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Aider error: {0}")]
    Connector(#[from] ConnectorError),

    #[error("Response error: {0}")]
    Response(#[from] ResponseError),

    #[error("Agent {0} does not accept answers")]
    Unsupported(String),

    #[error("Agent {0} is busy with another request")]
    Busy(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl AgentError {
    /// Check if this error represents a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AgentError::Cancelled | AgentError::Gateway(GatewayError::Cancelled))
    }
}

/// Everything an agent needs to answer one request.
#[derive(Clone)]
pub struct AgentRequest {
    pub session: Arc<ChatSession>,
    pub request: Arc<ChatRequestModel>,
    pub cancellation: CancellationToken,
}

impl AgentRequest {
    pub fn new(
        session: Arc<ChatSession>,
        request: Arc<ChatRequestModel>,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            session,
            request,
            cancellation,
        }
    }

    /// The request text without `@agent` mentions.
    pub fn prompt_text(&self) -> String {
        self.request.message().prompt_text()
    }
}

#[async_trait]
pub trait ChatAgent: Send + Sync {
    fn descriptor(&self) -> &AgentDescriptor;

    fn id(&self) -> &str {
        &self.descriptor().id
    }

    /// Answer `request`, populating and finishing its response.
    async fn invoke(&self, request: AgentRequest) -> Result<(), AgentError>;

    /// Whether the agent asks questions and takes the answer as its next
    /// request (`@id <option>`).
    fn accepts_answers(&self) -> bool {
        false
    }
}

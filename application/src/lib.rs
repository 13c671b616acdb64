//! Application layer for chatwire
//!
//! This crate contains the chat agents, the dispatch use case and the port
//! definitions. It depends only on the domain layer.

pub mod agents;
pub mod ports;
pub mod use_cases;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use agents::{
    AIDER_AGENT_ID, AgentError, AgentRequest, AiderChatAgent, CODING_AGENT_ID, COMMAND_AGENT_ID,
    ChatAgent, ChatAgentService, CodingChatAgent, CommandChatAgent, DELEGATING_AGENT_ID,
    DelegatingChatAgent,
};
pub use ports::{
    aider_connector::{AiderClient, AiderConnector, ConnectorError, ConnectorEvent},
    command_registry::CommandRegistry,
    conversation_logger::{ConversationEvent, ConversationLogger, NoConversationLogger},
    language_model::{
        GatewayError, LanguageModel, LanguageModelRegistry, LanguageModelRequest, StreamEvent,
        StreamHandle,
    },
    preferences::{ChatPreferences, StaticPreferences},
};
pub use use_cases::chat_service::{ChatError, ChatInvocation, ChatService};

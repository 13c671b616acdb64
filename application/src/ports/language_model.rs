//! Language model port
//!
//! Defines how agents talk to language models. Models are looked up by
//! *purpose* (`chat`, `command`, `agent-selection`) so each agent can be
//! bound to a different model.

use async_trait::async_trait;
use chatwire_domain::ChatMessage;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Purpose of general chat (the coding agent).
pub const PURPOSE_CHAT: &str = "chat";
/// Purpose of the command agent.
pub const PURPOSE_COMMAND: &str = "command";
/// Purpose of the delegating agent's selection request.
pub const PURPOSE_AGENT_SELECTION: &str = "agent-selection";

/// Errors that can occur during language model operations
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Other error: {0}")]
    Other(String),
}

/// One event of a streamed completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// An incremental piece of the reply.
    Delta(String),
    /// The stream finished; carries the full text when the transport knows it.
    Completed(String),
    /// The stream failed.
    Error(String),
}

/// A request to a language model.
#[derive(Debug, Clone, Default)]
pub struct LanguageModelRequest {
    pub messages: Vec<ChatMessage>,
}

impl LanguageModelRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self { messages }
    }
}

/// Handle for receiving streaming events from a language model.
///
/// Wraps an `mpsc::Receiver<StreamEvent>` and provides convenience methods
/// for consuming the stream.
pub struct StreamHandle {
    pub receiver: mpsc::Receiver<StreamEvent>,
}

impl StreamHandle {
    pub fn new(receiver: mpsc::Receiver<StreamEvent>) -> Self {
        Self { receiver }
    }

    /// A handle that yields `text` as one completed event.
    pub fn ready(text: impl Into<String>) -> Self {
        let (tx, rx) = mpsc::channel(1);
        // capacity 1 and a fresh channel: cannot be full
        let _ = tx.try_send(StreamEvent::Completed(text.into()));
        Self::new(rx)
    }

    /// Next event, or `None` once the producer is gone.
    pub async fn next(&mut self) -> Option<StreamEvent> {
        self.receiver.recv().await
    }

    /// Consume the stream and collect all text into a single string.
    pub async fn collect_text(mut self) -> Result<String, GatewayError> {
        let mut full_text = String::new();
        while let Some(event) = self.receiver.recv().await {
            match event {
                StreamEvent::Delta(chunk) => full_text.push_str(&chunk),
                StreamEvent::Completed(text) => {
                    if full_text.is_empty() {
                        return Ok(text);
                    }
                    return Ok(full_text);
                }
                StreamEvent::Error(e) => {
                    return Err(GatewayError::RequestFailed(e));
                }
            }
        }
        // Channel closed without Completed: return what we have
        Ok(full_text)
    }
}

/// A language model able to answer a request as a stream.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Identifier such as `openai/gpt-4o`.
    fn id(&self) -> &str;

    /// Send a request and get a streaming response.
    async fn request(&self, request: LanguageModelRequest) -> Result<StreamHandle, GatewayError>;

    /// Send a request and wait for the full text.
    async fn complete(&self, request: LanguageModelRequest) -> Result<String, GatewayError> {
        self.request(request).await?.collect_text().await
    }
}

/// Selects the model to use for a purpose.
pub trait LanguageModelRegistry: Send + Sync {
    fn select(&self, purpose: &str) -> Option<Arc<dyn LanguageModel>>;
}

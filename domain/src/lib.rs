//! Domain layer for chatwire
//!
//! Pure types and parsers with no I/O:
//!
//! - [`message`]: messages exchanged with the external Aider wrapper and the
//!   events its output demultiplexes into
//! - [`chat`]: response content, the response/request models and sessions
//! - [`dispatch`]: agent descriptors and parsers for the language-model
//!   replies that pick an agent or a command
//!
//! # Response lifecycle
//!
//! Every [`ChatRequestModel`] owns exactly one [`ChatResponseModel`]. The
//! agent answering the request appends [`ResponseContent`] fragments and
//! finally calls `complete()` or `cancel()`; consecutive fragments of a
//! mergeable kind are merged in place.

pub mod chat;
pub mod core;
pub mod dispatch;
pub mod message;
pub mod util;

pub use chat::{
    ChatMessage, ChatRequest, ChatRequestModel, ChatResponse, ChatResponseModel, ChatRole,
    ChatSession, CommandRef, ContentKind, ParsedChatRequest, ProgressMessage, ProgressStatus,
    RemovalReason, RequestPart, ResponseChange, ResponseContent, ResponseState, ToolCallContent,
    parse_chat_request,
};
pub use core::error::{DomainError, ResponseError};
pub use dispatch::{
    AgentDescriptor, DEFAULT_DELEGATE, ParsedCommand, agent_manifest, parse_agent_selection,
    parse_command_response,
};
pub use message::{DemuxEvent, END_REQUEST_MARKER, Message, QuestionOption, ToolSeverity};

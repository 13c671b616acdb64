//! Chat request/response model.

pub mod content;
pub mod request;
pub mod response;
pub mod session;

pub use content::{
    CodeContent, CommandContent, CommandRef, ContentKind, ContentString, ErrorContent,
    HorizontalLayoutContent, InformationalContent, MarkdownContent, MergeContent,
    QuestionContent, ResponseContent, TextContent, ToolCallContent,
};
pub use request::{ChatRequest, ChatRequestModel, ParsedChatRequest, RequestPart, parse_chat_request};
pub use response::{
    ChatResponse, ChatResponseModel, ListenerId, ProgressMessage, ProgressStatus, ResponseChange,
    ResponseState,
};
pub use session::{ChatMessage, ChatRole, ChatSession, RemovalReason};

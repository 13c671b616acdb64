//! Chat requests and their parsed form.

use crate::chat::response::ChatResponseModel;
use crate::util::generate_id;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A request as typed by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub text: String,
}

impl ChatRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// A span of a parsed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RequestPart {
    Text { text: String },
    AgentMention { agent_id: String },
}

/// A request split into text and `@agent` mentions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedChatRequest {
    pub request: ChatRequest,
    pub parts: Vec<RequestPart>,
}

impl ParsedChatRequest {
    /// The first mentioned agent id, if any.
    pub fn agent_mention(&self) -> Option<&str> {
        self.parts.iter().find_map(|part| match part {
            RequestPart::AgentMention { agent_id } => Some(agent_id.as_str()),
            RequestPart::Text { .. } => None,
        })
    }

    /// The request text with mentions removed, trimmed.
    pub fn prompt_text(&self) -> String {
        let joined: String = self
            .parts
            .iter()
            .filter_map(|part| match part {
                RequestPart::Text { text } => Some(text.as_str()),
                RequestPart::AgentMention { .. } => None,
            })
            .collect();
        joined.trim().to_string()
    }
}

fn is_agent_id_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_' || c == '.'
}

/// Split `text` into text parts and `@id` mentions.
///
/// A mention starts with `@` at the beginning of the text or after
/// whitespace, followed by at least one id character, and names an id for
/// which `is_agent` holds. Anything else (e-mail addresses, a lone `@`,
/// `@Override`) stays text.
pub fn parse_chat_request(text: &str, is_agent: impl Fn(&str) -> bool) -> ParsedChatRequest {
    let mut parts = Vec::new();
    let mut pending = String::new();
    let mut chars = text.char_indices().peekable();
    let mut prev: Option<char> = None;

    while let Some((idx, c)) = chars.next() {
        let at_boundary = prev.is_none_or(char::is_whitespace);
        if c == '@' && at_boundary {
            let rest = &text[idx + 1..];
            let id_len: usize = rest
                .chars()
                .take_while(|c| is_agent_id_char(*c))
                .map(char::len_utf8)
                .sum();
            // trailing dots are punctuation, not part of the id
            let id = rest[..id_len].trim_end_matches('.');
            if !id.is_empty() && is_agent(id) {
                if !pending.is_empty() {
                    parts.push(RequestPart::Text {
                        text: std::mem::take(&mut pending),
                    });
                }
                parts.push(RequestPart::AgentMention {
                    agent_id: id.to_string(),
                });
                let consumed = idx + 1 + id.len();
                while chars.peek().is_some_and(|(i, _)| *i < consumed) {
                    chars.next();
                }
                prev = id.chars().last();
                continue;
            }
        }
        pending.push(c);
        prev = Some(c);
    }
    if !pending.is_empty() {
        parts.push(RequestPart::Text { text: pending });
    }

    ParsedChatRequest {
        request: ChatRequest::new(text),
        parts,
    }
}

/// One submitted request together with its response.
///
/// The request/response pairing is fixed at construction.
#[derive(Debug)]
pub struct ChatRequestModel {
    id: String,
    session_id: String,
    message: ParsedChatRequest,
    agent_id: Option<String>,
    response: Arc<ChatResponseModel>,
}

impl ChatRequestModel {
    pub fn new(
        session_id: impl Into<String>,
        message: ParsedChatRequest,
        agent_id: Option<String>,
    ) -> Self {
        let id = generate_id();
        let response = Arc::new(ChatResponseModel::new(id.clone()));
        Self {
            id,
            session_id: session_id.into(),
            message,
            agent_id,
            response,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn request(&self) -> &ChatRequest {
        &self.message.request
    }

    pub fn message(&self) -> &ParsedChatRequest {
        &self.message
    }

    /// The agent selected at dispatch time.
    pub fn agent_id(&self) -> Option<&str> {
        self.agent_id.as_deref()
    }

    pub fn response(&self) -> &Arc<ChatResponseModel> {
        &self.response
    }
}

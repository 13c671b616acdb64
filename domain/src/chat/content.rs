//! Typed response content.
//!
//! A chat response is an ordered list of [`ResponseContent`] fragments. The
//! set of kinds is closed; the two optional capabilities a fragment may have
//! are explicit traits:
//!
//! - [`ContentString`]: render the fragment as plain text for the flattened
//!   response view
//! - [`MergeContent`]: absorb the next fragment of the same kind in place
//!
//! [`ResponseContent::as_string`] and [`ResponseContent::merge`] dispatch to
//! those traits by pattern matching.

use crate::message::QuestionOption;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Discriminant of a [`ResponseContent`] fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContentKind {
    Text,
    Markdown,
    Code,
    Command,
    Question,
    Informational,
    ToolCall,
    Horizontal,
    Error,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Text => "text",
            ContentKind::Markdown => "markdown",
            ContentKind::Code => "code",
            ContentKind::Command => "command",
            ContentKind::Question => "question",
            ContentKind::Informational => "informational",
            ContentKind::ToolCall => "toolCall",
            ContentKind::Horizontal => "horizontal",
            ContentKind::Error => "error",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fragments that can be rendered into the flattened response string.
pub trait ContentString {
    /// `None` when the fragment has nothing to contribute to the text view.
    fn as_string(&self) -> Option<String>;
}

/// Fragments that can absorb a following fragment of the same kind.
pub trait MergeContent {
    /// Merge `next` into `self`. Returns `false` when the two fragments must
    /// stay separate.
    fn merge(&mut self, next: &Self) -> bool;
}

/// Plain text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextContent {
    pub content: String,
}

impl ContentString for TextContent {
    fn as_string(&self) -> Option<String> {
        Some(self.content.clone())
    }
}

impl MergeContent for TextContent {
    fn merge(&mut self, next: &Self) -> bool {
        self.content.push_str(&next.content);
        true
    }
}

/// Markdown source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkdownContent {
    pub content: String,
}

impl ContentString for MarkdownContent {
    fn as_string(&self) -> Option<String> {
        Some(self.content.clone())
    }
}

impl MergeContent for MarkdownContent {
    fn merge(&mut self, next: &Self) -> bool {
        self.content.push_str(&next.content);
        true
    }
}

/// A code block with an optional language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeContent {
    pub code: String,
    pub language: Option<String>,
}

impl ContentString for CodeContent {
    fn as_string(&self) -> Option<String> {
        Some(format!(
            "```{}\n{}\n```",
            self.language.as_deref().unwrap_or(""),
            self.code.trim_end_matches('\n')
        ))
    }
}

impl MergeContent for CodeContent {
    fn merge(&mut self, next: &Self) -> bool {
        if self.language != next.language {
            return false;
        }
        self.code.push_str(&next.code);
        true
    }
}

/// Reference to an IDE command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl CommandRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Id of the command used for responses that carry a custom handler.
pub const GENERIC_COMMAND_ID: &str = "ai-chat.command-chat-response.generic";

/// A command the user may execute, with optional arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandContent {
    pub command: CommandRef,
    #[serde(default)]
    pub arguments: Vec<String>,
    /// Whether executing the command runs a custom handler instead of a
    /// registered command.
    #[serde(default)]
    pub custom_handler: bool,
}

impl ContentString for CommandContent {
    fn as_string(&self) -> Option<String> {
        Some(self.command.id.clone())
    }
}

/// A question with a fixed set of answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionContent {
    pub question: String,
    pub options: Vec<QuestionOption>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub selected: Option<QuestionOption>,
}

impl ContentString for QuestionContent {
    fn as_string(&self) -> Option<String> {
        Some(self.question.clone())
    }
}

/// Informational text added by the orchestration itself (e.g. delegation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InformationalContent {
    pub content: String,
}

impl ContentString for InformationalContent {
    fn as_string(&self) -> Option<String> {
        Some(self.content.clone())
    }
}

/// A tool invocation (or long-running step) and its outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallContent {
    pub id: Option<String>,
    pub name: Option<String>,
    pub arguments: Option<String>,
    pub finished: bool,
    pub result: Option<String>,
}

impl ContentString for ToolCallContent {
    fn as_string(&self) -> Option<String> {
        if !self.finished {
            return None;
        }
        self.result.clone().or_else(|| self.name.clone())
    }
}

impl MergeContent for ToolCallContent {
    fn merge(&mut self, next: &Self) -> bool {
        if self.id.is_none() || self.id != next.id {
            return false;
        }
        self.finished = next.finished;
        if next.result.is_some() {
            self.result = next.result.clone();
        }
        if let Some(arguments) = &next.arguments {
            self.arguments
                .get_or_insert_with(String::new)
                .push_str(arguments);
        }
        true
    }
}

/// Children rendered side by side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorizontalLayoutContent {
    pub children: Vec<ResponseContent>,
}

impl ContentString for HorizontalLayoutContent {
    fn as_string(&self) -> Option<String> {
        let parts: Vec<String> = self
            .children
            .iter()
            .filter_map(ResponseContent::as_string)
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

/// An error shown to the user in place of a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorContent {
    pub message: String,
}

impl ContentString for ErrorContent {
    fn as_string(&self) -> Option<String> {
        Some(format!("Error: {}", self.message))
    }
}

/// One fragment of a chat response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ResponseContent {
    Text(TextContent),
    Markdown(MarkdownContent),
    Code(CodeContent),
    Command(CommandContent),
    Question(QuestionContent),
    Informational(InformationalContent),
    ToolCall(ToolCallContent),
    Horizontal(HorizontalLayoutContent),
    Error(ErrorContent),
}

impl ResponseContent {
    pub fn text(content: impl Into<String>) -> Self {
        ResponseContent::Text(TextContent {
            content: content.into(),
        })
    }

    pub fn markdown(content: impl Into<String>) -> Self {
        ResponseContent::Markdown(MarkdownContent {
            content: content.into(),
        })
    }

    pub fn code(code: impl Into<String>, language: Option<&str>) -> Self {
        ResponseContent::Code(CodeContent {
            code: code.into(),
            language: language.map(str::to_string),
        })
    }

    pub fn command(command: CommandRef, arguments: Vec<String>) -> Self {
        ResponseContent::Command(CommandContent {
            command,
            arguments,
            custom_handler: false,
        })
    }

    pub fn informational(content: impl Into<String>) -> Self {
        ResponseContent::Informational(InformationalContent {
            content: content.into(),
        })
    }

    pub fn error(message: impl Into<String>) -> Self {
        ResponseContent::Error(ErrorContent {
            message: message.into(),
        })
    }

    pub fn horizontal(children: Vec<ResponseContent>) -> Self {
        ResponseContent::Horizontal(HorizontalLayoutContent { children })
    }

    pub fn kind(&self) -> ContentKind {
        match self {
            ResponseContent::Text(_) => ContentKind::Text,
            ResponseContent::Markdown(_) => ContentKind::Markdown,
            ResponseContent::Code(_) => ContentKind::Code,
            ResponseContent::Command(_) => ContentKind::Command,
            ResponseContent::Question(_) => ContentKind::Question,
            ResponseContent::Informational(_) => ContentKind::Informational,
            ResponseContent::ToolCall(_) => ContentKind::ToolCall,
            ResponseContent::Horizontal(_) => ContentKind::Horizontal,
            ResponseContent::Error(_) => ContentKind::Error,
        }
    }

    pub fn as_string(&self) -> Option<String> {
        match self {
            ResponseContent::Text(c) => c.as_string(),
            ResponseContent::Markdown(c) => c.as_string(),
            ResponseContent::Code(c) => c.as_string(),
            ResponseContent::Command(c) => c.as_string(),
            ResponseContent::Question(c) => c.as_string(),
            ResponseContent::Informational(c) => c.as_string(),
            ResponseContent::ToolCall(c) => c.as_string(),
            ResponseContent::Horizontal(c) => c.as_string(),
            ResponseContent::Error(c) => c.as_string(),
        }
    }

    /// Whether this kind implements [`MergeContent`].
    pub fn supports_merge(&self) -> bool {
        matches!(
            self,
            ResponseContent::Text(_)
                | ResponseContent::Markdown(_)
                | ResponseContent::Code(_)
                | ResponseContent::ToolCall(_)
        )
    }

    /// Merge `next` into `self` when both have the same mergeable kind.
    ///
    /// Returns `false` when the kinds differ, the kind has no merge
    /// capability, or the merge itself declines.
    pub fn merge(&mut self, next: &ResponseContent) -> bool {
        match (self, next) {
            (ResponseContent::Text(a), ResponseContent::Text(b)) => a.merge(b),
            (ResponseContent::Markdown(a), ResponseContent::Markdown(b)) => a.merge(b),
            (ResponseContent::Code(a), ResponseContent::Code(b)) => a.merge(b),
            (ResponseContent::ToolCall(a), ResponseContent::ToolCall(b)) => a.merge(b),
            _ => false,
        }
    }
}

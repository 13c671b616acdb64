//! Messages exchanged between an external-process connector and its client.
//!
//! [`Message`] is the structured payload the Aider wrapper embeds in its
//! output (`<question>{...}</question>`) or that the connector synthesizes
//! itself (repo-scan progress). [`DemuxEvent`] is one unit of demultiplexed
//! process output: plain data, a structured message, or the end of a turn.

use serde::{Deserialize, Serialize};

/// Wire value signalling the end of a turn in the data channel.
pub const END_REQUEST_MARKER: &str = "$END_REQUEST$";

/// Answer options a [`Message::Question`] may offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionOption {
    Yes,
    No,
    All,
    #[serde(alias = "skip all")]
    Skip,
    #[serde(rename = "don't", alias = "don't ask again")]
    Dont,
}

impl QuestionOption {
    /// The answer line sent back to the process when this option is chosen.
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionOption::Yes => "yes",
            QuestionOption::No => "no",
            QuestionOption::All => "all",
            QuestionOption::Skip => "skip",
            QuestionOption::Dont => "don't",
        }
    }
}

/// Severity of a [`Message::Tool`] line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolSeverity {
    #[default]
    Info,
    Warning,
    Error,
}

/// A discrete unit of model or process output.
///
/// Serialized with a `type` discriminant:
///
/// ```
/// use chatwire_domain::message::{Message, QuestionOption};
///
/// let json = r#"{"type":"question","text":"Apply edit?","options":["yes","no"]}"#;
/// let message: Message = serde_json::from_str(json).unwrap();
/// assert_eq!(
///     message,
///     Message::Question {
///         text: "Apply edit?".to_string(),
///         options: vec![QuestionOption::Yes, QuestionOption::No],
///         subject: None,
///     }
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Message {
    /// Assistant text.
    #[serde(alias = "assistantResponse")]
    Text { text: String },

    /// A question the process is blocked on until the user answers.
    Question {
        text: String,
        #[serde(default)]
        options: Vec<QuestionOption>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        subject: Option<String>,
    },

    /// Progress of a long-running process step.
    Progress { text: String, done: bool },

    /// Output of a tool run by the process.
    Tool {
        text: String,
        #[serde(default)]
        severity: ToolSeverity,
    },

    /// Token accounting for the last exchange.
    TokensInfo {
        text: String,
        #[serde(rename = "tokensSent")]
        tokens_sent: String,
        #[serde(rename = "tokensReceived")]
        tokens_received: String,
        cost: String,
    },
}

impl Message {
    pub fn text(&self) -> &str {
        match self {
            Message::Text { text }
            | Message::Question { text, .. }
            | Message::Progress { text, .. }
            | Message::Tool { text, .. }
            | Message::TokensInfo { text, .. } => text,
        }
    }

    /// The `type` discriminant as it appears on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Text { .. } => "text",
            Message::Question { .. } => "question",
            Message::Progress { .. } => "progress",
            Message::Tool { .. } => "tool",
            Message::TokensInfo { .. } => "tokensInfo",
        }
    }

    /// Build a progress message.
    pub fn progress(text: impl Into<String>, done: bool) -> Self {
        Message::Progress {
            text: text.into(),
            done,
        }
    }

    /// Parse a JSON payload into a message.
    pub fn from_json(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}

/// One event produced by demultiplexing an external process's output.
#[derive(Debug, Clone, PartialEq)]
pub enum DemuxEvent {
    /// Text outside any tag (`tag == None`) or inside a `[~tag~]` span.
    Data { text: String, tag: Option<String> },
    /// The end-of-turn sentinel was seen.
    EndOfTurn,
    /// A structured message, e.g. a parsed `<question>` span.
    Message(Message),
}

impl DemuxEvent {
    pub fn data(text: impl Into<String>, tag: Option<&str>) -> Self {
        DemuxEvent::Data {
            text: text.into(),
            tag: tag.map(str::to_string),
        }
    }

    /// The payload of the data channel, with [`END_REQUEST_MARKER`] standing
    /// in for [`DemuxEvent::EndOfTurn`]. `None` for structured messages.
    pub fn data_payload(&self) -> Option<&str> {
        match self {
            DemuxEvent::Data { text, .. } => Some(text),
            DemuxEvent::EndOfTurn => Some(END_REQUEST_MARKER),
            DemuxEvent::Message(_) => None,
        }
    }

    pub fn is_end_of_turn(&self) -> bool {
        matches!(self, DemuxEvent::EndOfTurn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_accepts_wrapper_option_spellings() {
        let json = r#"{"type":"question","text":"Create file?","options":["yes","no","all","skip all","don't ask again"]}"#;
        let message = Message::from_json(json).unwrap();
        match message {
            Message::Question { options, .. } => assert_eq!(
                options,
                vec![
                    QuestionOption::Yes,
                    QuestionOption::No,
                    QuestionOption::All,
                    QuestionOption::Skip,
                    QuestionOption::Dont,
                ]
            ),
            other => panic!("expected question, got {:?}", other),
        }
    }

    #[test]
    fn assistant_response_alias_maps_to_text() {
        let message = Message::from_json(r#"{"type":"assistantResponse","text":"hi"}"#).unwrap();
        assert_eq!(message, Message::Text { text: "hi".into() });
        assert_eq!(message.kind(), "text");
    }

    #[test]
    fn tool_severity_defaults_to_info() {
        let message = Message::from_json(r#"{"type":"tool","text":"ran"}"#).unwrap();
        assert_eq!(
            message,
            Message::Tool {
                text: "ran".into(),
                severity: ToolSeverity::Info
            }
        );
    }

    #[test]
    fn tokens_info_uses_camel_case_fields() {
        let json = r#"{"type":"tokensInfo","text":"","tokensSent":"1k","tokensReceived":"200","cost":"$0.01"}"#;
        let message = Message::from_json(json).unwrap();
        let back = serde_json::to_value(&message).unwrap();
        assert_eq!(back["tokensSent"], "1k");
        assert_eq!(back["type"], "tokensInfo");
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(Message::from_json(r#"{"type":"nope","text":"x"}"#).is_err());
    }

    #[test]
    fn end_of_turn_exposes_sentinel_payload() {
        assert_eq!(DemuxEvent::EndOfTurn.data_payload(), Some(END_REQUEST_MARKER));
        assert_eq!(DemuxEvent::data("A", Some("output")).data_payload(), Some("A"));
        assert_eq!(
            DemuxEvent::Message(Message::progress("scan", false)).data_payload(),
            None
        );
    }
}

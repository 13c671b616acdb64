//! Parsing of command-agent replies.

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};

/// Reply used when the model produced no JSON object at all.
const NO_JSON_MESSAGE: &str = "Please try again.";

/// The single command a command-agent reply resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ParsedCommand {
    /// A command registered in the command registry.
    #[serde(rename = "theia-command")]
    Registered {
        #[serde(rename = "commandId")]
        command_id: String,
        #[serde(default)]
        arguments: Vec<String>,
    },
    /// A command executed by a custom handler instead of the registry.
    #[serde(rename = "custom-handler")]
    CustomHandler {
        #[serde(rename = "commandId", default)]
        command_id: Option<String>,
        #[serde(default)]
        arguments: Vec<String>,
    },
    #[serde(rename = "no-command")]
    NoCommand {
        #[serde(default)]
        message: Option<String>,
    },
}

/// Parse a command-agent reply.
///
/// The JSON object spans from the first `{` to the last `}` of the reply,
/// so surrounding prose and code fences are ignored. A reply without braces
/// becomes [`ParsedCommand::NoCommand`] asking the user to retry; braces that
/// do not hold a valid command object are an error.
pub fn parse_command_response(reply: &str) -> Result<ParsedCommand, DomainError> {
    let span = reply
        .find('{')
        .and_then(|start| reply.rfind('}').filter(|end| *end > start).map(|end| (start, end)));

    let Some((start, end)) = span else {
        return Ok(ParsedCommand::NoCommand {
            message: Some(NO_JSON_MESSAGE.to_string()),
        });
    };

    serde_json::from_str(&reply[start..=end])
        .map_err(|e| DomainError::InvalidPayload(format!("command reply: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registered_command_in_fence() {
        let reply = "```json\n{\n  \"type\": \"theia-command\",\n  \"commandId\": \"core.about\"\n}\n```";
        assert_eq!(
            parse_command_response(reply).unwrap(),
            ParsedCommand::Registered {
                command_id: "core.about".into(),
                arguments: vec![],
            }
        );
    }

    #[test]
    fn test_custom_handler_with_arguments() {
        let reply = r#"{"type":"custom-handler","commandId":"ai-chat.command-chat-response.generic","arguments":["foo","bar"]}"#;
        assert_eq!(
            parse_command_response(reply).unwrap(),
            ParsedCommand::CustomHandler {
                command_id: Some("ai-chat.command-chat-response.generic".into()),
                arguments: vec!["foo".into(), "bar".into()],
            }
        );
    }

    #[test]
    fn test_no_command_keeps_message() {
        let reply = r#"Sorry: {"type":"no-command","message":"nothing fits"}"#;
        assert_eq!(
            parse_command_response(reply).unwrap(),
            ParsedCommand::NoCommand {
                message: Some("nothing fits".into())
            }
        );
    }

    #[test]
    fn test_reply_without_json_asks_to_retry() {
        assert_eq!(
            parse_command_response("workbench.action.selectIconTheme").unwrap(),
            ParsedCommand::NoCommand {
                message: Some("Please try again.".into())
            }
        );
    }

    #[test]
    fn test_two_objects_is_a_parse_error() {
        let reply = r#"{"type":"theia-command","commandId":"a"} and {"type":"theia-command","commandId":"b"}"#;
        assert!(matches!(
            parse_command_response(reply),
            Err(DomainError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_unknown_type_is_a_parse_error() {
        assert!(parse_command_response(r#"{"type":"shell","cmd":"ls"}"#).is_err());
    }
}

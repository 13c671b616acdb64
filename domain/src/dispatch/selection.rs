//! Parsing of agent-selection replies.
//!
//! The selecting model is asked for a JSON array of agent ids, e.g.
//! `["Aider", "Coding"]`. Models like to wrap that in a ```` ```json ````
//! fence or add prose around it, so the parser looks for the first `[` and
//! the last `]` and parses what is between.

use crate::core::error::DomainError;
use crate::dispatch::descriptor::AgentDescriptor;

/// Agent used when selection yields nothing.
pub const DEFAULT_DELEGATE: &str = "Coding";

/// Extract the selected agent ids from `reply`, dropping `self_id`.
///
/// An empty result is `Ok(vec![])`; a reply without a parseable string
/// array is an error.
pub fn parse_agent_selection(reply: &str, self_id: &str) -> Result<Vec<String>, DomainError> {
    let start = reply
        .find('[')
        .ok_or_else(|| DomainError::InvalidPayload("no JSON array in agent selection".into()))?;
    let end = reply
        .rfind(']')
        .filter(|end| *end > start)
        .ok_or_else(|| DomainError::InvalidPayload("unterminated JSON array".into()))?;

    let ids: Vec<String> = serde_json::from_str(&reply[start..=end])
        .map_err(|e| DomainError::InvalidPayload(format!("agent selection: {e}")))?;

    Ok(ids.into_iter().filter(|id| id != self_id).collect())
}

/// The agent list shown to the selecting model, one agent per line,
/// excluding `self_id`.
pub fn agent_manifest<'a>(
    agents: impl IntoIterator<Item = &'a AgentDescriptor>,
    self_id: &str,
) -> String {
    agents
        .into_iter()
        .filter(|a| a.id != self_id)
        .map(AgentDescriptor::manifest_line)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_array() {
        let ids = parse_agent_selection(r#"["Aider"]"#, "DelegatingChatAgent").unwrap();
        assert_eq!(ids, vec!["Aider"]);
    }

    #[test]
    fn test_fenced_array() {
        let reply = "```json\n[\"Aider\", \"Coding\"]\n```";
        let ids = parse_agent_selection(reply, "DelegatingChatAgent").unwrap();
        assert_eq!(ids, vec!["Aider", "Coding"]);
    }

    #[test]
    fn test_self_is_filtered() {
        let ids =
            parse_agent_selection(r#"["DelegatingChatAgent", "Coding"]"#, "DelegatingChatAgent")
                .unwrap();
        assert_eq!(ids, vec!["Coding"]);
    }

    #[test]
    fn test_only_self_yields_empty() {
        let ids = parse_agent_selection(r#"["DelegatingChatAgent"]"#, "DelegatingChatAgent")
            .unwrap();
        assert!(ids.is_empty());
    }

    #[test]
    fn test_prose_is_an_error() {
        assert!(parse_agent_selection("I think Coding fits best.", "X").is_err());
        assert!(parse_agent_selection("] backwards [", "X").is_err());
        assert!(parse_agent_selection("[1, 2]", "X").is_err());
    }

    #[test]
    fn test_manifest_skips_self() {
        let agents = vec![
            AgentDescriptor::new("DelegatingChatAgent", "DelegatingChatAgent", "picks agents"),
            AgentDescriptor::new("Coding", "Coding", "general programming"),
            AgentDescriptor::new("Aider", "Aider", "edits files"),
        ];
        let manifest = agent_manifest(&agents, "DelegatingChatAgent");
        assert_eq!(
            manifest,
            "Coding: Coding — general programming\nAider: Aider — edits files"
        );
    }
}

//! Console output formatter for chat responses

use chatwire_domain::{AgentDescriptor, ResponseContent};
use colored::Colorize;

/// Formats response content for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Format one content item. Plain text kinds are returned as-is so they
    /// can be streamed; everything else is decorated.
    pub fn format_content(content: &ResponseContent) -> String {
        match content {
            ResponseContent::Text(_) | ResponseContent::Markdown(_) => {
                content.as_string().unwrap_or_default()
            }
            ResponseContent::Code(code) => {
                let language = code.language.as_deref().unwrap_or("code");
                format!(
                    "{}\n{}\n{}",
                    format!("── {} ──", language).bright_black(),
                    code.code.trim_end_matches('\n'),
                    "────".bright_black()
                )
            }
            ResponseContent::Command(command) => {
                let label = command.command.label.as_deref().unwrap_or(&command.command.id);
                let mut line = format!("{} {}", "▶".green().bold(), label.green());
                if !command.arguments.is_empty() {
                    line.push_str(&format!(" {}", command.arguments.join(" ").bright_black()));
                }
                line
            }
            ResponseContent::Question(question) => {
                let options: Vec<String> = question
                    .options
                    .iter()
                    .map(|o| match question.selected {
                        Some(selected) if selected == *o => o.as_str().green().bold().to_string(),
                        _ => o.as_str().to_string(),
                    })
                    .collect();
                format!(
                    "{} {} [{}]",
                    "?".yellow().bold(),
                    question.question.yellow(),
                    options.join("/")
                )
            }
            ResponseContent::Informational(info) => info.content.bright_black().italic().to_string(),
            ResponseContent::ToolCall(call) => {
                let name = call.name.as_deref().unwrap_or("tool");
                if call.finished {
                    format!(
                        "{} {} {}",
                        "✓".green(),
                        name.bright_black(),
                        call.result.as_deref().unwrap_or("").green()
                    )
                } else {
                    format!("{} {}", "…".cyan(), name.cyan())
                }
            }
            ResponseContent::Horizontal(layout) => layout
                .children
                .iter()
                .map(Self::format_content)
                .collect::<Vec<_>>()
                .join("  "),
            ResponseContent::Error(error) => {
                format!("{} {}", "Error:".red().bold(), error.message.red())
            }
        }
    }

    /// Format a full response, items separated by a blank line.
    pub fn format_response(content: &[ResponseContent]) -> String {
        content
            .iter()
            .map(Self::format_content)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Format the agent list shown by `/agents`.
    pub fn format_agents(agents: &[AgentDescriptor]) -> String {
        let mut output = String::new();
        for agent in agents {
            output.push_str(&format!(
                "  {} {}\n",
                format!("@{}", agent.id).cyan().bold(),
                agent.description
            ));
        }
        output
    }

    /// Line introducing the agent that answers.
    pub fn agent_header(agent_id: &str) -> String {
        format!("── {} ──", agent_id).yellow().bold().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatwire_domain::chat::content::QuestionContent;
    use chatwire_domain::{CommandRef, QuestionOption};

    #[test]
    fn test_markdown_is_unchanged() {
        let out = ConsoleFormatter::format_content(&ResponseContent::markdown("**hi**"));
        assert_eq!(out, "**hi**");
    }

    #[test]
    fn test_command_with_arguments() {
        colored::control::set_override(false);
        let content = ResponseContent::command(
            CommandRef::new("core.open").with_label("Open File"),
            vec!["a.rs".into()],
        );
        assert_eq!(ConsoleFormatter::format_content(&content), "▶ Open File a.rs");
    }

    #[test]
    fn test_question_lists_options() {
        colored::control::set_override(false);
        let content = ResponseContent::Question(QuestionContent {
            question: "Apply edit?".into(),
            options: vec![QuestionOption::Yes, QuestionOption::No],
            session_id: None,
            agent_id: None,
            selected: None,
        });
        assert_eq!(ConsoleFormatter::format_content(&content), "? Apply edit? [yes/no]");
    }

    #[test]
    fn test_response_skips_empty_items() {
        colored::control::set_override(false);
        let out = ConsoleFormatter::format_response(&[
            ResponseContent::markdown("one"),
            ResponseContent::markdown(""),
            ResponseContent::error("boom"),
        ]);
        assert_eq!(out, "one\n\nError: boom");
    }
}

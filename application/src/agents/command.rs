//! Command agent: maps a request to exactly one IDE command.

use super::{AgentError, AgentRequest, ChatAgent};
use crate::ports::command_registry::CommandRegistry;
use crate::ports::language_model::{LanguageModelRegistry, LanguageModelRequest, PURPOSE_COMMAND};
use async_trait::async_trait;
use chatwire_domain::chat::content::{CommandContent, GENERIC_COMMAND_ID};
use chatwire_domain::util::generate_id;
use chatwire_domain::{
    AgentDescriptor, ChatMessage, CommandRef, ParsedCommand, ResponseContent,
    parse_command_response,
};
use std::sync::Arc;
use tracing::{debug, error};

pub const COMMAND_AGENT_ID: &str = "CommandChatAgent";

const NO_COMMAND_MESSAGE: &str = "Sorry, I can't find such a command";

fn system_prompt(command_list: &str) -> String {
    format!(
        r#"# System Prompt

You are a service that helps users find commands to execute in an IDE.
You reply with stringified JSON Objects that tell the user which command to execute and its arguments, if any.
Reply with exactly one JSON object inside ```json and ``` markers. Never reply with just the command id.

# Reply types

A registered command, optionally with arguments:

```json
{{ "type": "theia-command", "commandId": "core.about", "arguments": ["foo"] }}
```

A custom command that is not in the list below. It always uses the command id `{GENERIC_COMMAND_ID}`:

```json
{{ "type": "custom-handler", "commandId": "{GENERIC_COMMAND_ID}", "arguments": ["foo", "bar"] }}
```

No fitting command, with a message explaining the situation to the user:

```json
{{ "type": "no-command", "message": "a message explaining what is wrong" }}
```

# Rules

Only use `theia-command` with ids from the list below, formatted as `command-id: Label`.
If several commands fit, return the one that fits best. If the user says the last command was not right,
return the next best fit based on the conversation history. If nothing fits, reply with `no-command`.

Begin List:
{command_list}
End List
"#
    )
}

pub struct CommandChatAgent {
    descriptor: AgentDescriptor,
    models: Arc<dyn LanguageModelRegistry>,
    commands: Arc<dyn CommandRegistry>,
}

impl CommandChatAgent {
    pub fn new(models: Arc<dyn LanguageModelRegistry>, commands: Arc<dyn CommandRegistry>) -> Self {
        Self {
            descriptor: AgentDescriptor::new(
                COMMAND_AGENT_ID,
                COMMAND_AGENT_ID,
                "This agent knows everything about the commands you can run within the IDE.",
            ),
            models,
            commands,
        }
    }

    fn command_list(&self) -> String {
        self.commands
            .commands()
            .iter()
            .map(|c| format!("{}: {}", c.id, c.label.as_deref().unwrap_or("")))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Turn the parsed reply into response content. `None` means the
    /// reply could not be resolved and the response has been canceled.
    fn content_for(&self, parsed: ParsedCommand) -> Option<ResponseContent> {
        match parsed {
            ParsedCommand::Registered {
                command_id,
                arguments,
            } => {
                let Some(command) = self.commands.get_command(&command_id) else {
                    error!(command = %command_id, "No command with this id");
                    return None;
                };
                Some(ResponseContent::horizontal(vec![
                    ResponseContent::markdown("I found this command that might help you:"),
                    ResponseContent::command(command, arguments),
                ]))
            }
            ParsedCommand::CustomHandler { arguments, .. } => {
                let command =
                    CommandRef::new(format!("ai-command-{}", generate_id())).with_label("AI Command");
                self.commands.register_command(command.clone());
                Some(ResponseContent::horizontal(vec![
                    ResponseContent::markdown("Try executing this:"),
                    ResponseContent::Command(CommandContent {
                        command,
                        arguments,
                        custom_handler: true,
                    }),
                ]))
            }
            ParsedCommand::NoCommand { message } => Some(ResponseContent::markdown(
                message.unwrap_or_else(|| NO_COMMAND_MESSAGE.to_string()),
            )),
        }
    }
}

#[async_trait]
impl ChatAgent for CommandChatAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, request: AgentRequest) -> Result<(), AgentError> {
        let model = self
            .models
            .select(PURPOSE_COMMAND)
            .ok_or_else(|| AgentError::NoLanguageModel(PURPOSE_COMMAND.to_string()))?;
        let response = request.request.response();

        let mut messages = vec![ChatMessage::system(system_prompt(&self.command_list()))];
        messages.extend(request.session.history(Some(request.request.id())));
        messages.push(ChatMessage::user(request.prompt_text()));

        let reply = tokio::select! {
            _ = request.cancellation.cancelled() => {
                response.cancel();
                return Ok(());
            }
            reply = model.complete(LanguageModelRequest::new(messages)) => reply?,
        };
        let parsed = parse_command_response(&reply)?;
        debug!(?parsed, "Command agent reply");

        match self.content_for(parsed) {
            Some(content) => {
                response.add_content(content)?;
                response.complete();
            }
            None => {
                response.cancel();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MemoryCommands, Scripted, ScriptedModel, ScriptedRegistry, agent_request};

    fn agent(reply: &str, commands: Arc<MemoryCommands>) -> (CommandChatAgent, Arc<ScriptedModel>) {
        let model = ScriptedModel::new("cmd", vec![Scripted::Text(reply.to_string())]);
        let agent = CommandChatAgent::new(
            ScriptedRegistry::with_model(PURPOSE_COMMAND, model.clone()),
            commands,
        );
        (agent, model)
    }

    #[tokio::test]
    async fn registered_command_is_offered() {
        let commands = MemoryCommands::with(&[("core.about", "About")]);
        let (agent, model) = agent(
            "```json\n{\"type\": \"theia-command\", \"commandId\": \"core.about\"}\n```",
            commands,
        );
        let (req, request) = agent_request("show the about dialog");

        agent.invoke(request).await.unwrap();

        let response = req.response();
        assert!(response.is_complete());
        assert_eq!(
            response.as_string(),
            "I found this command that might help you: core.about"
        );
        let system = &model.requests()[0].messages[0].content;
        assert!(system.contains("core.about: About"));
    }

    #[tokio::test]
    async fn unknown_command_cancels_response() {
        let (agent, _) = agent(
            r#"{"type": "theia-command", "commandId": "does.not.exist"}"#,
            MemoryCommands::with(&[]),
        );
        let (req, request) = agent_request("do something");

        agent.invoke(request).await.unwrap();
        assert!(req.response().is_canceled());
    }

    #[tokio::test]
    async fn custom_handler_registers_command() {
        let commands = MemoryCommands::with(&[]);
        let (agent, _) = agent(
            r#"{"type":"custom-handler","commandId":"ai-chat.command-chat-response.generic","arguments":["a"]}"#,
            commands.clone(),
        );
        let (req, request) = agent_request("run my thing");

        agent.invoke(request).await.unwrap();

        let registered = commands.commands();
        assert_eq!(registered.len(), 1);
        assert!(registered[0].id.starts_with("ai-command-"));
        match &req.response().content()[0] {
            ResponseContent::Horizontal(layout) => match &layout.children[1] {
                ResponseContent::Command(c) => {
                    assert!(c.custom_handler);
                    assert_eq!(c.arguments, vec!["a".to_string()]);
                }
                other => panic!("expected command, got {:?}", other),
            },
            other => panic!("expected layout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn reply_without_json_asks_to_retry() {
        let (agent, _) = agent("core.about", MemoryCommands::with(&[]));
        let (req, request) = agent_request("about?");

        agent.invoke(request).await.unwrap();
        assert_eq!(req.response().as_string(), "Please try again.");
    }

    #[tokio::test]
    async fn no_command_without_message_uses_default() {
        let (agent, _) = agent(r#"{"type":"no-command"}"#, MemoryCommands::with(&[]));
        let (req, request) = agent_request("open the windows");

        agent.invoke(request).await.unwrap();
        assert_eq!(req.response().as_string(), NO_COMMAND_MESSAGE);
    }

    #[tokio::test]
    async fn malformed_json_is_fatal() {
        let (agent, _) = agent("{ not json }", MemoryCommands::with(&[]));
        let (_, request) = agent_request("x");

        assert!(matches!(agent.invoke(request).await, Err(AgentError::Parse(_))));
    }
}

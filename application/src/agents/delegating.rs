//! Delegating agent: lets a language model pick the agent that answers.

use super::registry::ChatAgentService;
use super::{AgentError, AgentRequest, ChatAgent};
use crate::ports::conversation_logger::{ConversationEvent, ConversationLogger};
use crate::ports::language_model::{
    LanguageModelRegistry, LanguageModelRequest, PURPOSE_AGENT_SELECTION,
};
use async_trait::async_trait;
use chatwire_domain::util::preview;
use chatwire_domain::{
    AgentDescriptor, ChatMessage, DEFAULT_DELEGATE, ProgressStatus, ResponseContent,
    agent_manifest, parse_agent_selection,
};
use std::sync::{Arc, Weak};
use tracing::{error, info};

pub const DELEGATING_AGENT_ID: &str = "DelegatingChatAgent";

const PROGRESS_TEXT: &str = "Determining the most appropriate agent";

fn selection_prompt(manifest: &str) -> String {
    format!(
        "# Instructions

Your task is to identify which Chat Agent(s) should best reply a given user's message.
You consider all messages of the conversation to ensure consistency and avoid agent switches without a clear context change.
You should select the best Chat Agent based on the name and description of the agents, matching them to the user message.

## Constraints

Your response must be a JSON array containing the id(s) of the selected Chat Agent(s).

* Do not use ids that are not provided in the list below.
* Do not include any additional information, explanations, or questions for the user.
* If there is no suitable choice, pick the `{DEFAULT_DELEGATE}`.
* If there are multiple good choices, return all of them.

Unless there is a more specific agent available, select the `{DEFAULT_DELEGATE}`, especially for general programming-related questions.
You must only use the `id` attribute of the agent, never the name.

### Example Results

```json
[\"{DEFAULT_DELEGATE}\"]
```

```json
[\"AnotherChatAgent\", \"{DEFAULT_DELEGATE}\"]
```

## List of Currently Available Chat Agents

{manifest}
"
    )
}

pub struct DelegatingChatAgent {
    descriptor: AgentDescriptor,
    models: Arc<dyn LanguageModelRegistry>,
    agents: Weak<ChatAgentService>,
    logger: Arc<dyn ConversationLogger>,
}

impl DelegatingChatAgent {
    /// `agents` is the registry this agent is (usually) registered in, held
    /// weakly.
    pub fn new(
        models: Arc<dyn LanguageModelRegistry>,
        agents: &Arc<ChatAgentService>,
        logger: Arc<dyn ConversationLogger>,
    ) -> Self {
        Self {
            descriptor: AgentDescriptor::new(
                DELEGATING_AGENT_ID,
                DELEGATING_AGENT_ID,
                "A chat agent that analyzes the user request and the available chat agents \
                 to choose and delegate to the best fitting agent for answering the user request.",
            ),
            models,
            agents: Arc::downgrade(agents),
            logger,
        }
    }

    async fn select_agent(&self, request: &AgentRequest, agents: &ChatAgentService) -> Result<Vec<String>, AgentError> {
        let model = self
            .models
            .select(PURPOSE_AGENT_SELECTION)
            .ok_or_else(|| AgentError::NoLanguageModel(PURPOSE_AGENT_SELECTION.to_string()))?;

        let manifest = agent_manifest(&agents.descriptors(), &self.descriptor.id);
        let mut messages = vec![ChatMessage::system(selection_prompt(&manifest))];
        messages.extend(request.session.history(Some(request.request.id())));
        messages.push(ChatMessage::user(request.prompt_text()));

        let reply = model.complete(LanguageModelRequest::new(messages)).await?;
        match parse_agent_selection(&reply, &self.descriptor.id) {
            Ok(ids) => Ok(ids),
            Err(e) => {
                error!(error = %e, reply = %preview(&reply, 200), "Failed to parse agent selection");
                Ok(Vec::new())
            }
        }
    }
}

#[async_trait]
impl ChatAgent for DelegatingChatAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, request: AgentRequest) -> Result<(), AgentError> {
        let agents = self
            .agents
            .upgrade()
            .ok_or_else(|| AgentError::UnknownAgent(DEFAULT_DELEGATE.to_string()))?;
        let response = Arc::clone(request.request.response());
        response.add_progress_message(PROGRESS_TEXT);

        let selected = tokio::select! {
            _ = request.cancellation.cancelled() => {
                response.settle_progress_messages(ProgressStatus::Failed);
                response.cancel();
                return Ok(());
            }
            selected = self.select_agent(&request, &agents) => selected,
        };
        let selected = match selected {
            Ok(ids) => ids,
            Err(e) => {
                response.settle_progress_messages(ProgressStatus::Failed);
                return Err(e);
            }
        };

        let delegate = match selected.into_iter().next() {
            Some(id) => {
                response.settle_progress_messages(ProgressStatus::Completed);
                id
            }
            None => {
                error!("No agent was selected, delegating to default chat agent");
                response.settle_progress_messages(ProgressStatus::Failed);
                DEFAULT_DELEGATE.to_string()
            }
        };

        info!(request = %request.request.id(), delegate = %delegate, "Delegating request");
        self.logger.log(ConversationEvent::new(
            "delegation",
            serde_json::json!({
                "request_id": request.request.id(),
                "delegate": delegate,
            }),
        ));

        response.add_content(ResponseContent::informational(format!(
            "*{}*: Delegating to `@{}`",
            self.descriptor.id, delegate
        )))?;
        response.override_agent_id(delegate.clone());

        agents.invoke_agent(&delegate, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::conversation_logger::NoConversationLogger;
    use crate::test_support::{EchoAgent, Scripted, ScriptedModel, ScriptedRegistry, agent_request};
    use chatwire_domain::ContentKind;

    fn setup(reply: Scripted) -> (Arc<ChatAgentService>, Arc<DelegatingChatAgent>) {
        let service = Arc::new(ChatAgentService::new());
        let models = ScriptedRegistry::with_model(
            PURPOSE_AGENT_SELECTION,
            ScriptedModel::new("selector", vec![reply]),
        );
        let delegating = Arc::new(DelegatingChatAgent::new(
            models,
            &service,
            Arc::new(NoConversationLogger),
        ));
        service.register(delegating.clone());
        service.register(Arc::new(EchoAgent::with_reply("Coding", "from coding")));
        service.register(Arc::new(EchoAgent::with_reply("Aider", "from aider")));
        (service, delegating)
    }

    #[tokio::test]
    async fn delegates_to_selected_agent() {
        let (_service, agent) = setup(Scripted::Text("```json\n[\"Aider\", \"Coding\"]\n```".into()));
        let (req, request) = agent_request("edit main.rs");

        agent.invoke(request).await.unwrap();

        let response = req.response();
        assert_eq!(response.agent_id().as_deref(), Some("Aider"));
        let content = response.content();
        assert_eq!(content[0].kind(), ContentKind::Informational);
        assert_eq!(
            content[0].as_string().as_deref(),
            Some("*DelegatingChatAgent*: Delegating to `@Aider`")
        );
        assert!(response.as_string().ends_with("from aider"));
        assert!(
            response
                .progress_messages()
                .iter()
                .all(|m| m.status == ProgressStatus::Completed)
        );
    }

    #[tokio::test]
    async fn unparseable_reply_falls_back_to_coding() {
        let (_service, agent) = setup(Scripted::Text("I would pick Aider.".into()));
        let (req, request) = agent_request("anything");

        agent.invoke(request).await.unwrap();

        let response = req.response();
        assert_eq!(response.agent_id().as_deref(), Some(DEFAULT_DELEGATE));
        assert!(response.as_string().ends_with("from coding"));
        assert_eq!(response.progress_messages()[0].status, ProgressStatus::Failed);
    }

    #[tokio::test]
    async fn self_only_selection_falls_back_to_coding() {
        let (_service, agent) = setup(Scripted::Text("[\"DelegatingChatAgent\"]".into()));
        let (req, request) = agent_request("anything");

        agent.invoke(request).await.unwrap();
        assert_eq!(req.response().agent_id().as_deref(), Some(DEFAULT_DELEGATE));
    }

    #[tokio::test]
    async fn unknown_delegate_is_an_error() {
        let (_service, agent) = setup(Scripted::Text("[\"Nope\"]".into()));
        let (_, request) = agent_request("anything");

        let err = agent.invoke(request).await.unwrap_err();
        assert!(matches!(err, AgentError::UnknownAgent(id) if id == "Nope"));
    }

    #[tokio::test]
    async fn manifest_is_sent_without_self() {
        let service = Arc::new(ChatAgentService::new());
        let model = ScriptedModel::new("selector", vec![Scripted::Text("[\"Coding\"]".into())]);
        let delegating = Arc::new(DelegatingChatAgent::new(
            ScriptedRegistry::with_model(PURPOSE_AGENT_SELECTION, model.clone()),
            &service,
            Arc::new(NoConversationLogger),
        ));
        service.register(delegating.clone());
        service.register(Arc::new(EchoAgent::new("Coding")));
        let (_, request) = agent_request("hi");

        delegating.invoke(request).await.unwrap();

        let system = &model.requests()[0].messages[0].content;
        assert!(system.contains("Coding: Coding — "));
        assert!(!system.contains("DelegatingChatAgent:"));
    }
}

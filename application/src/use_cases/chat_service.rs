//! Chat service use case.
//!
//! Owns the chat sessions and dispatches each request to exactly one agent.
//! Agent selection precedence, each step consulted only when the previous
//! one yields nothing:
//!
//! 1. the agent `@mentioned` in the request
//! 2. the configured default agent ([`ChatPreferences`])
//! 3. the fallback agent bound at startup
//! 4. the first registered agent
//!
//! The selected agent runs on a spawned task; [`ChatInvocation`] lets the
//! caller wait for it or cancel it.

use crate::agents::{AgentError, AgentRequest, ChatAgent, ChatAgentService};
use crate::ports::conversation_logger::{
    ConversationEvent, ConversationLogger, NoConversationLogger,
};
use crate::ports::preferences::ChatPreferences;
use chatwire_domain::util::preview;
use chatwire_domain::{
    ChatRequestModel, ChatSession, ParsedChatRequest, QuestionOption, ResponseContent,
    parse_chat_request,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Errors that can occur during chat dispatch
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Unknown session: {0}")]
    UnknownSession(String),

    #[error("Unknown request: {0}")]
    UnknownRequest(String),

    #[error("No chat agent is available to answer the request")]
    NoAgent,

    #[error("Request {0} has no unanswered question")]
    NoPendingQuestion(String),

    #[error(transparent)]
    Agent(#[from] AgentError),
}

/// A running request.
pub struct ChatInvocation {
    pub request: Arc<ChatRequestModel>,
    pub agent_id: String,
    cancellation: CancellationToken,
    handle: JoinHandle<()>,
}

impl ChatInvocation {
    /// Cancel the agent cooperatively.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Wait until the agent has returned.
    pub async fn wait(self) {
        if let Err(e) = self.handle.await {
            error!(error = %e, "Agent task failed");
        }
    }
}

type ActiveRequests = Arc<Mutex<HashMap<String, CancellationToken>>>;

pub struct ChatService {
    agents: Arc<ChatAgentService>,
    preferences: Arc<dyn ChatPreferences>,
    fallback_agent: Option<String>,
    conversation_logger: Arc<dyn ConversationLogger>,
    sessions: Mutex<Vec<Arc<ChatSession>>>,
    active: ActiveRequests,
}

impl ChatService {
    pub fn new(agents: Arc<ChatAgentService>, preferences: Arc<dyn ChatPreferences>) -> Self {
        Self {
            agents,
            preferences,
            fallback_agent: None,
            conversation_logger: Arc::new(NoConversationLogger),
            sessions: Mutex::new(Vec::new()),
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Bind the agent used when neither a mention nor a preference resolves.
    pub fn with_fallback_agent(mut self, id: impl Into<String>) -> Self {
        self.fallback_agent = Some(id.into());
        self
    }

    /// Create with a conversation logger.
    pub fn with_conversation_logger(mut self, logger: Arc<dyn ConversationLogger>) -> Self {
        self.conversation_logger = logger;
        self
    }

    pub fn agents(&self) -> &Arc<ChatAgentService> {
        &self.agents
    }

    pub fn create_session(&self) -> Arc<ChatSession> {
        let session = Arc::new(ChatSession::new());
        self.sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Arc::clone(&session));
        debug!(session = %session.id(), "Created chat session");
        session
    }

    pub fn get_session(&self, id: &str) -> Option<Arc<ChatSession>> {
        self.sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|s| s.id() == id)
            .cloned()
    }

    pub fn sessions(&self) -> Vec<Arc<ChatSession>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Remove a session, canceling its running requests.
    pub fn delete_session(&self, id: &str) -> Result<(), ChatError> {
        let session = {
            let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
            let pos = sessions
                .iter()
                .position(|s| s.id() == id)
                .ok_or_else(|| ChatError::UnknownSession(id.to_string()))?;
            sessions.remove(pos)
        };
        for request in session.requests() {
            self.cancel_token(request.id());
        }
        session.clear();
        Ok(())
    }

    /// Select the agent for `parsed` using the dispatch precedence.
    pub fn resolve_agent(&self, parsed: &ParsedChatRequest) -> Option<Arc<dyn ChatAgent>> {
        if let Some(id) = parsed.agent_mention() {
            match self.agents.get_agent(id) {
                Some(agent) => return Some(agent),
                None => debug!(agent = %id, "Mentioned agent is not registered"),
            }
        }

        if let Some(id) = self.preferences.default_agent() {
            match self.agents.get_agent(&id) {
                Some(agent) => return Some(agent),
                None => warn!(agent = %id, "Configured default agent is not registered"),
            }
        }

        if let Some(agent) = self
            .fallback_agent
            .as_deref()
            .and_then(|id| self.agents.get_agent(id))
        {
            return Some(agent);
        }

        let first = self.agents.agents().into_iter().next();
        if let Some(agent) = &first {
            warn!(agent = %agent.id(), "No default agent configured, using the first registered agent");
        }
        first
    }

    /// Submit `text` to a session and start the selected agent.
    pub fn send_request(&self, session_id: &str, text: &str) -> Result<ChatInvocation, ChatError> {
        let session = self
            .get_session(session_id)
            .ok_or_else(|| ChatError::UnknownSession(session_id.to_string()))?;

        let parsed = parse_chat_request(text, |id| self.agents.get_agent(id).is_some());
        let agent = self.resolve_agent(&parsed).ok_or(ChatError::NoAgent)?;
        let agent_id = agent.id().to_string();
        let request = session.add_request(parsed, Some(agent_id.clone()));

        info!(
            session = %session_id,
            request = %request.id(),
            agent = %agent_id,
            text = %preview(text, 80),
            "Dispatching chat request"
        );
        self.conversation_logger.log(ConversationEvent::new(
            "request_submitted",
            serde_json::json!({
                "session_id": session_id,
                "request_id": request.id(),
                "text": text,
            }),
        ));
        self.conversation_logger.log(ConversationEvent::new(
            "agent_selected",
            serde_json::json!({
                "request_id": request.id(),
                "agent_id": agent_id,
            }),
        ));

        let cancellation = CancellationToken::new();
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(request.id().to_string(), cancellation.clone());

        let response = Arc::clone(request.response());
        response.mark_started();

        let agent_request = AgentRequest::new(session, Arc::clone(&request), cancellation.clone());
        let active = Arc::clone(&self.active);
        let logger = Arc::clone(&self.conversation_logger);
        let request_id = request.id().to_string();

        let handle = tokio::spawn(async move {
            if let Err(e) = agent.invoke(agent_request).await {
                if e.is_cancelled() {
                    debug!(request = %request_id, "Agent cancelled");
                } else {
                    error!(request = %request_id, agent = %agent.id(), error = %e, "Agent failed");
                    if let Err(e) = response.add_content(ResponseContent::error(e.to_string())) {
                        debug!(error = %e, "Could not attach error to response");
                    }
                }
                response.cancel();
            }
            if !response.is_complete() {
                warn!(request = %request_id, "Agent returned without finishing the response");
            }
            active
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&request_id);
            logger.log(ConversationEvent::new(
                "response_completed",
                serde_json::json!({
                    "request_id": request_id,
                    "agent_id": response.agent_id(),
                    "state": response.state(),
                    "text": response.as_string(),
                }),
            ));
        });

        Ok(ChatInvocation {
            request,
            agent_id,
            cancellation,
            handle,
        })
    }

    fn cancel_token(&self, request_id: &str) -> bool {
        match self
            .active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(request_id)
        {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel a running request and its response.
    pub fn cancel_request(&self, session_id: &str, request_id: &str) -> Result<(), ChatError> {
        let session = self
            .get_session(session_id)
            .ok_or_else(|| ChatError::UnknownSession(session_id.to_string()))?;
        let request = session
            .get_request(request_id)
            .ok_or_else(|| ChatError::UnknownRequest(request_id.to_string()))?;
        self.cancel_token(request_id);
        request.response().cancel();
        Ok(())
    }

    /// Answer the pending question of a request.
    ///
    /// The answer is recorded on the question and then sent as a new
    /// request, `@agent <option>`, to the agent that produced the response,
    /// so whatever the agent does next streams into a response of its own.
    pub fn answer_question(
        &self,
        session_id: &str,
        request_id: &str,
        option: QuestionOption,
    ) -> Result<ChatInvocation, ChatError> {
        let session = self
            .get_session(session_id)
            .ok_or_else(|| ChatError::UnknownSession(session_id.to_string()))?;
        let request = session
            .get_request(request_id)
            .ok_or_else(|| ChatError::UnknownRequest(request_id.to_string()))?;

        let agent_id = request
            .response()
            .agent_id()
            .or_else(|| request.agent_id().map(str::to_string))
            .ok_or(ChatError::NoAgent)?;
        let agent = self
            .agents
            .get_agent(&agent_id)
            .ok_or_else(|| AgentError::UnknownAgent(agent_id.clone()))?;
        if !agent.accepts_answers() {
            return Err(AgentError::Unsupported(agent_id).into());
        }

        if !request.response().select_answer(option) {
            debug!(request = %request_id, "No unanswered question");
            return Err(ChatError::NoPendingQuestion(request_id.to_string()));
        }
        self.send_request(session_id, &format!("@{} {}", agent_id, option.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::preferences::StaticPreferences;
    use crate::test_support::EchoAgent;
    use async_trait::async_trait;
    use chatwire_domain::chat::content::QuestionContent;
    use chatwire_domain::{AgentDescriptor, ContentKind, ResponseState};

    struct FailingAgent {
        descriptor: AgentDescriptor,
    }

    #[async_trait]
    impl ChatAgent for FailingAgent {
        fn descriptor(&self) -> &AgentDescriptor {
            &self.descriptor
        }

        async fn invoke(&self, _request: AgentRequest) -> Result<(), AgentError> {
            Err(AgentError::NoLanguageModel("chat".into()))
        }
    }

    /// Agent that waits for cancellation before canceling its response.
    struct PatientAgent {
        descriptor: AgentDescriptor,
    }

    #[async_trait]
    impl ChatAgent for PatientAgent {
        fn descriptor(&self) -> &AgentDescriptor {
            &self.descriptor
        }

        async fn invoke(&self, request: AgentRequest) -> Result<(), AgentError> {
            request.cancellation.cancelled().await;
            request.request.response().cancel();
            Ok(())
        }
    }

    /// Agent that asks a question when told to and echoes anything else.
    struct AskingAgent {
        descriptor: AgentDescriptor,
    }

    #[async_trait]
    impl ChatAgent for AskingAgent {
        fn descriptor(&self) -> &AgentDescriptor {
            &self.descriptor
        }

        async fn invoke(&self, request: AgentRequest) -> Result<(), AgentError> {
            let response = request.request.response();
            let content = match request.prompt_text().as_str() {
                "ask" => ResponseContent::Question(QuestionContent {
                    question: "Proceed?".into(),
                    options: vec![QuestionOption::Yes, QuestionOption::No],
                    session_id: None,
                    agent_id: None,
                    selected: None,
                }),
                other => ResponseContent::markdown(format!("got {}", other)),
            };
            response.add_content(content)?;
            response.complete();
            Ok(())
        }

        fn accepts_answers(&self) -> bool {
            true
        }
    }

    fn registry(ids: &[&str]) -> Arc<ChatAgentService> {
        let service = Arc::new(ChatAgentService::new());
        for id in ids {
            service.register(Arc::new(EchoAgent::new(id)));
        }
        service
    }

    fn service(default: Option<&str>, fallback: Option<&str>) -> ChatService {
        let agents = registry(&["First", "Mentioned", "Configured", "Fallback"]);
        let service = ChatService::new(
            agents,
            Arc::new(StaticPreferences::new(default.map(str::to_string))),
        );
        match fallback {
            Some(id) => service.with_fallback_agent(id),
            None => service,
        }
    }

    fn resolved(service: &ChatService, text: &str) -> Option<String> {
        service
            .resolve_agent(&parse_chat_request(text, |id| service.agents().get_agent(id).is_some()))
            .map(|a| a.id().to_string())
    }

    #[test]
    fn mention_beats_default_and_fallback() {
        let service = service(Some("Configured"), Some("Fallback"));
        assert_eq!(resolved(&service, "@Mentioned hi").as_deref(), Some("Mentioned"));
    }

    #[test]
    fn default_beats_fallback_without_mention() {
        let service = service(Some("Configured"), Some("Fallback"));
        assert_eq!(resolved(&service, "hi").as_deref(), Some("Configured"));
    }

    #[test]
    fn fallback_is_used_without_mention_and_default() {
        let service = service(None, Some("Fallback"));
        assert_eq!(resolved(&service, "hi").as_deref(), Some("Fallback"));
    }

    #[test]
    fn unregistered_mention_does_not_hide_a_later_one() {
        let service = service(Some("Configured"), None);
        assert_eq!(
            resolved(&service, "@Nobody @Mentioned hi").as_deref(),
            Some("Mentioned")
        );
        assert_eq!(resolved(&service, "keep @Override here").as_deref(), Some("Configured"));
    }

    #[test]
    fn unresolvable_steps_are_skipped() {
        let service = service(Some("Missing"), Some("AlsoMissing"));
        assert_eq!(resolved(&service, "@Nobody hi").as_deref(), Some("First"));
    }

    #[test]
    fn no_agents_resolves_nothing() {
        let service = ChatService::new(
            Arc::new(ChatAgentService::new()),
            Arc::new(StaticPreferences::default()),
        );
        assert!(resolved(&service, "hi").is_none());

        let session = service.create_session();
        let err = service.send_request(session.id(), "hi").err().unwrap();
        assert!(matches!(err, ChatError::NoAgent));
        assert!(session.is_empty());
    }

    #[tokio::test]
    async fn send_request_runs_selected_agent() {
        let agents = Arc::new(ChatAgentService::new());
        let echo = Arc::new(EchoAgent::with_reply("Echo", "hello back"));
        agents.register(echo.clone());
        let service = ChatService::new(agents, Arc::new(StaticPreferences::default()));
        let session = service.create_session();

        let invocation = service.send_request(session.id(), "hello").unwrap();
        assert_eq!(invocation.agent_id, "Echo");
        let request = Arc::clone(&invocation.request);
        invocation.wait().await;

        assert_eq!(request.response().state(), ResponseState::Complete);
        assert_eq!(request.response().as_string(), "hello back");
        assert_eq!(echo.invocations(), vec!["hello"]);
        assert_eq!(session.requests().len(), 1);
    }

    #[tokio::test]
    async fn agent_error_cancels_with_error_content() {
        let agents = Arc::new(ChatAgentService::new());
        agents.register(Arc::new(FailingAgent {
            descriptor: AgentDescriptor::new("Broken", "Broken", "always fails"),
        }));
        let service = ChatService::new(agents, Arc::new(StaticPreferences::default()));
        let session = service.create_session();

        let invocation = service.send_request(session.id(), "hello").unwrap();
        let request = Arc::clone(&invocation.request);
        invocation.wait().await;

        let response = request.response();
        assert!(response.is_canceled());
        assert_eq!(response.content()[0].kind(), ContentKind::Error);
    }

    #[tokio::test]
    async fn cancel_request_reaches_agent() {
        let agents = Arc::new(ChatAgentService::new());
        agents.register(Arc::new(PatientAgent {
            descriptor: AgentDescriptor::new("Patient", "Patient", "waits"),
        }));
        let service = ChatService::new(agents, Arc::new(StaticPreferences::default()));
        let session = service.create_session();

        let invocation = service.send_request(session.id(), "wait").unwrap();
        let request = Arc::clone(&invocation.request);
        service.cancel_request(session.id(), request.id()).unwrap();
        invocation.wait().await;

        assert!(request.response().is_canceled());
    }

    #[tokio::test]
    async fn unknown_session_is_rejected() {
        let service = service(None, None);
        assert!(matches!(
            service.send_request("nope", "hi"),
            Err(ChatError::UnknownSession(_))
        ));
        assert!(service.delete_session("nope").is_err());
    }

    #[tokio::test]
    async fn answering_unsupported_agent_fails() {
        let service = service(None, None);
        let session = service.create_session();
        let invocation = service.send_request(session.id(), "@Mentioned hi").unwrap();
        let request_id = invocation.request.id().to_string();
        invocation.wait().await;

        let err = service
            .answer_question(session.id(), &request_id, QuestionOption::Yes)
            .err()
            .unwrap();
        assert!(matches!(err, ChatError::Agent(AgentError::Unsupported(id)) if id == "Mentioned"));
    }

    #[tokio::test]
    async fn answer_is_sent_as_a_new_request() {
        let agents = Arc::new(ChatAgentService::new());
        agents.register(Arc::new(AskingAgent {
            descriptor: AgentDescriptor::new("Asker", "Asker", "asks"),
        }));
        let service = ChatService::new(agents, Arc::new(StaticPreferences::default()));
        let session = service.create_session();

        let asked = service.send_request(session.id(), "ask").unwrap();
        let request_id = asked.request.id().to_string();
        asked.wait().await;

        let answered = service
            .answer_question(session.id(), &request_id, QuestionOption::No)
            .unwrap();
        let follow_up = Arc::clone(&answered.request);
        answered.wait().await;

        assert_eq!(follow_up.request().text, "@Asker no");
        assert_eq!(follow_up.response().as_string(), "got no");
        assert_eq!(session.requests().len(), 2);

        // the question is answered now
        let err = service
            .answer_question(session.id(), &request_id, QuestionOption::Yes)
            .err()
            .unwrap();
        assert!(matches!(err, ChatError::NoPendingQuestion(id) if id == request_id));
        assert_eq!(session.requests().len(), 2);
    }

    #[tokio::test]
    async fn answer_without_question_is_rejected() {
        let agents = Arc::new(ChatAgentService::new());
        agents.register(Arc::new(AskingAgent {
            descriptor: AgentDescriptor::new("Asker", "Asker", "asks"),
        }));
        let service = ChatService::new(agents, Arc::new(StaticPreferences::default()));
        let session = service.create_session();

        let invocation = service.send_request(session.id(), "hello").unwrap();
        let request_id = invocation.request.id().to_string();
        invocation.wait().await;

        assert!(matches!(
            service.answer_question(session.id(), &request_id, QuestionOption::Yes),
            Err(ChatError::NoPendingQuestion(_))
        ));
        assert_eq!(session.requests().len(), 1);
    }

    #[tokio::test]
    async fn delete_session_cancels_requests() {
        let agents = Arc::new(ChatAgentService::new());
        agents.register(Arc::new(PatientAgent {
            descriptor: AgentDescriptor::new("Patient", "Patient", "waits"),
        }));
        let service = ChatService::new(agents, Arc::new(StaticPreferences::default()));
        let session = service.create_session();
        let invocation = service.send_request(session.id(), "wait").unwrap();
        let request = Arc::clone(&invocation.request);

        service.delete_session(session.id()).unwrap();
        invocation.wait().await;

        assert!(request.response().is_canceled());
        assert!(service.get_session(session.id()).is_none());
    }
}

//! Aider agent: relays requests to the external Aider process.
//!
//! One Aider process serves one turn at a time. The agent registers a
//! [`TurnRouter`] as the connector's client; the router maps connector
//! events onto the response of the active request and signals the waiting
//! `invoke` when the turn ends.

use super::{AgentError, AgentRequest, ChatAgent};
use crate::ports::aider_connector::{
    AiderClient, AiderConnector, ConnectorError, ConnectorEvent,
};
use async_trait::async_trait;
use chatwire_domain::chat::content::QuestionContent;
use chatwire_domain::{
    AgentDescriptor, ChatRequestModel, DemuxEvent, Message, ResponseContent, ToolCallContent,
};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

pub const AIDER_AGENT_ID: &str = "Aider";

/// Result shown on the repo-scan tool call.
const REPO_SCANNED: &str = "Repo Scanned";

#[derive(Debug)]
enum TurnEnd {
    EndOfTurn,
    Closed(Option<i32>),
    Invalid(String),
}

struct ActiveTurn {
    request: Arc<ChatRequestModel>,
    session_id: String,
    done: oneshot::Sender<TurnEnd>,
}

#[derive(Default)]
struct RouterState {
    active: Option<ActiveTurn>,
    /// Canceled turns whose end-of-turn marker has not arrived yet. Output
    /// is dropped until it has.
    abandoned: usize,
}

/// Routes connector events to the response of the active turn.
#[derive(Default)]
struct TurnRouter {
    state: Mutex<RouterState>,
}

impl TurnRouter {
    fn lock(&self) -> MutexGuard<'_, RouterState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn begin(&self, turn: ActiveTurn) -> Result<(), AgentError> {
        let mut state = self.lock();
        if state.active.is_some() {
            return Err(AgentError::Busy(AIDER_AGENT_ID.to_string()));
        }
        state.active = Some(turn);
        Ok(())
    }

    /// Drop the active turn for `request_id` without waiting for its end.
    fn abandon(&self, request_id: &str, sent: bool) {
        let mut state = self.lock();
        if state
            .active
            .as_ref()
            .is_some_and(|t| t.request.id() == request_id)
        {
            state.active = None;
            if sent {
                state.abandoned += 1;
            }
        }
    }

    fn content_for(message: Message, turn_session: &str) -> ResponseContent {
        match message {
            Message::Question {
                text,
                options,
                subject,
            } => ResponseContent::Question(QuestionContent {
                question: match subject {
                    Some(subject) => format!("{subject} {text}"),
                    None => text,
                },
                options,
                session_id: Some(turn_session.to_string()),
                agent_id: Some(AIDER_AGENT_ID.to_string()),
                selected: None,
            }),
            Message::Progress { text, done } => ResponseContent::ToolCall(ToolCallContent {
                id: Some(text.clone()),
                name: Some(text),
                arguments: None,
                finished: done,
                result: Some(REPO_SCANNED.to_string()),
            }),
            other => ResponseContent::markdown(other.text()),
        }
    }
}

impl AiderClient for TurnRouter {
    fn on_event(&self, event: ConnectorEvent) {
        let mut state = self.lock();

        let content = match event {
            ConnectorEvent::Started => {
                debug!("Aider started");
                return;
            }
            ConnectorEvent::Error(e) => {
                error!(error = %e, "Aider reported an error");
                return;
            }
            ConnectorEvent::InvalidPayload(payload) => {
                // The rest of the turn is unusable; its end marker still follows.
                if state.abandoned == 0 {
                    if let Some(turn) = state.active.take() {
                        state.abandoned += 1;
                        let _ = turn.done.send(TurnEnd::Invalid(payload));
                        return;
                    }
                }
                warn!(%payload, "Dropping malformed Aider payload");
                return;
            }
            ConnectorEvent::Closed { code } => {
                state.abandoned = 0;
                if let Some(turn) = state.active.take() {
                    let _ = turn.done.send(TurnEnd::Closed(code));
                }
                return;
            }
            ConnectorEvent::Output(DemuxEvent::EndOfTurn) => {
                if state.abandoned > 0 {
                    state.abandoned -= 1;
                    return;
                }
                match state.active.take() {
                    Some(turn) => {
                        let _ = turn.done.send(TurnEnd::EndOfTurn);
                    }
                    None => debug!("End of turn without an active request"),
                }
                return;
            }
            ConnectorEvent::Output(DemuxEvent::Data { text, .. }) => {
                if text.is_empty() {
                    return;
                }
                ResponseContent::markdown(text)
            }
            ConnectorEvent::Output(DemuxEvent::Message(message)) => {
                let session = state
                    .active
                    .as_ref()
                    .map(|t| t.session_id.clone())
                    .unwrap_or_default();
                Self::content_for(message, &session)
            }
        };

        if state.abandoned > 0 {
            return;
        }
        let Some(request) = state.active.as_ref().map(|t| Arc::clone(&t.request)) else {
            debug!("Dropping Aider output without an active request");
            return;
        };
        drop(state);

        if let Err(e) = request.response().add_content(content) {
            warn!(error = %e, "Dropping Aider output for a finished response");
        }
    }
}

pub struct AiderChatAgent {
    descriptor: AgentDescriptor,
    connector: Arc<dyn AiderConnector>,
    router: Arc<TurnRouter>,
}

impl AiderChatAgent {
    /// Create the agent and register it as the connector's client.
    pub fn new(connector: Arc<dyn AiderConnector>) -> Self {
        let router = Arc::new(TurnRouter::default());
        connector.set_client(router.clone());
        Self {
            descriptor: AgentDescriptor::new(
                AIDER_AGENT_ID,
                AIDER_AGENT_ID,
                "This is a chat agent helping with coding. It edits files in the workspace \
                 through Aider.",
            )
            .with_tag("Chat"),
            connector,
            router,
        }
    }

    /// Add files to the Aider chat.
    pub async fn add_files(&self, paths: &[Option<String>]) -> Result<(), AgentError> {
        self.connector.add(paths).await?;
        Ok(())
    }
}

#[async_trait]
impl ChatAgent for AiderChatAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, request: AgentRequest) -> Result<(), AgentError> {
        let text = request.prompt_text();
        let response = Arc::clone(request.request.response());
        let request_id = request.request.id().to_string();
        let (done_tx, done_rx) = oneshot::channel();

        self.router.begin(ActiveTurn {
            request: Arc::clone(&request.request),
            session_id: request.session.id().to_string(),
            done: done_tx,
        })?;

        if request.cancellation.is_cancelled() {
            self.router.abandon(&request_id, false);
            response.cancel();
            return Ok(());
        }
        if let Err(e) = self.connector.send_message(&text).await {
            self.router.abandon(&request_id, false);
            return Err(e.into());
        }
        info!(request = %request_id, "Sent request to Aider");

        tokio::select! {
            _ = request.cancellation.cancelled() => {
                debug!(request = %request_id, "Aider request cancelled");
                self.router.abandon(&request_id, true);
                response.cancel();
            }
            end = done_rx => match end {
                Ok(TurnEnd::EndOfTurn) => {
                    response.complete();
                }
                Ok(TurnEnd::Closed(code)) => {
                    warn!(?code, "Aider exited during a request");
                    response.cancel();
                }
                Ok(TurnEnd::Invalid(payload)) => {
                    error!(request = %request_id, "Aider sent a malformed question");
                    return Err(ConnectorError::InvalidPayload(payload).into());
                }
                Err(_) => {
                    response.cancel();
                }
            },
        }
        Ok(())
    }

    fn accepts_answers(&self) -> bool {
        true
    }
}

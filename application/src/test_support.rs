//! Hand-written port mocks shared by the unit tests.

use crate::agents::{AgentError, AgentRequest, ChatAgent};
use crate::ports::command_registry::CommandRegistry;
use crate::ports::language_model::{
    GatewayError, LanguageModel, LanguageModelRegistry, LanguageModelRequest, StreamEvent,
    StreamHandle,
};
use async_trait::async_trait;
use chatwire_domain::{
    AgentDescriptor, ChatRequestModel, ChatSession, CommandRef, ResponseContent,
    parse_chat_request,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// One scripted model reply.
#[derive(Debug, Clone)]
pub enum Scripted {
    /// The whole reply as one completed event.
    Text(String),
    /// The reply as a sequence of deltas.
    Deltas(Vec<String>),
    /// A stream that fails immediately.
    Error(String),
    /// A stream that never yields.
    Hang,
}

/// Model that returns scripted replies in order and records requests.
pub struct ScriptedModel {
    id: String,
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<LanguageModelRequest>>,
    hanging: Mutex<Vec<mpsc::Sender<StreamEvent>>>,
}

impl ScriptedModel {
    pub fn new(id: &str, script: Vec<Scripted>) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
            hanging: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<LanguageModelRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn id(&self) -> &str {
        &self.id
    }

    async fn request(&self, request: LanguageModelRequest) -> Result<StreamHandle, GatewayError> {
        self.requests.lock().unwrap().push(request);
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Scripted::Text("(no more responses)".to_string()));

        match next {
            Scripted::Text(text) => Ok(StreamHandle::ready(text)),
            Scripted::Deltas(deltas) => {
                let (tx, rx) = mpsc::channel(deltas.len() + 1);
                for delta in deltas {
                    tx.try_send(StreamEvent::Delta(delta)).unwrap();
                }
                tx.try_send(StreamEvent::Completed(String::new())).unwrap();
                Ok(StreamHandle::new(rx))
            }
            Scripted::Error(e) => {
                let (tx, rx) = mpsc::channel(1);
                tx.try_send(StreamEvent::Error(e)).unwrap();
                Ok(StreamHandle::new(rx))
            }
            Scripted::Hang => {
                let (tx, rx) = mpsc::channel(1);
                self.hanging.lock().unwrap().push(tx);
                Ok(StreamHandle::new(rx))
            }
        }
    }
}

/// Registry mapping purposes to fixed models.
#[derive(Default)]
pub struct ScriptedRegistry {
    models: HashMap<String, Arc<dyn LanguageModel>>,
}

impl ScriptedRegistry {
    pub fn empty() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_model(purpose: &str, model: Arc<ScriptedModel>) -> Arc<Self> {
        let mut models: HashMap<String, Arc<dyn LanguageModel>> = HashMap::new();
        models.insert(purpose.to_string(), model);
        Arc::new(Self { models })
    }
}

impl LanguageModelRegistry for ScriptedRegistry {
    fn select(&self, purpose: &str) -> Option<Arc<dyn LanguageModel>> {
        self.models.get(purpose).cloned()
    }
}

/// Agent that answers every request with a fixed markdown reply.
pub struct EchoAgent {
    descriptor: AgentDescriptor,
    reply: String,
    invocations: Mutex<Vec<String>>,
}

impl EchoAgent {
    pub fn new(id: &str) -> Self {
        Self::with_reply(id, id)
    }

    pub fn with_reply(id: &str, reply: &str) -> Self {
        Self {
            descriptor: AgentDescriptor::new(id, id, format!("Echo agent {id}")),
            reply: reply.to_string(),
            invocations: Mutex::new(Vec::new()),
        }
    }

    pub fn invocations(&self) -> Vec<String> {
        self.invocations.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatAgent for EchoAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, request: AgentRequest) -> Result<(), AgentError> {
        self.invocations
            .lock()
            .unwrap()
            .push(request.request.request().text.clone());
        let response = request.request.response();
        response.add_content(ResponseContent::markdown(self.reply.clone()))?;
        response.complete();
        Ok(())
    }
}

/// In-memory command registry.
#[derive(Default)]
pub struct MemoryCommands {
    commands: Mutex<Vec<CommandRef>>,
}

impl MemoryCommands {
    pub fn with(commands: &[(&str, &str)]) -> Arc<Self> {
        Arc::new(Self {
            commands: Mutex::new(
                commands
                    .iter()
                    .map(|(id, label)| CommandRef::new(*id).with_label(*label))
                    .collect(),
            ),
        })
    }
}

impl CommandRegistry for MemoryCommands {
    fn commands(&self) -> Vec<CommandRef> {
        self.commands.lock().unwrap().clone()
    }

    fn get_command(&self, id: &str) -> Option<CommandRef> {
        self.commands.lock().unwrap().iter().find(|c| c.id == id).cloned()
    }

    fn register_command(&self, command: CommandRef) {
        self.commands.lock().unwrap().push(command);
    }
}

/// A fresh session holding one request for `text`.
pub fn agent_request(text: &str) -> (Arc<ChatRequestModel>, AgentRequest) {
    let session = Arc::new(ChatSession::new());
    let request = session.add_request(parse_chat_request(text, |_| true), None);
    let agent_request = AgentRequest::new(session, Arc::clone(&request), CancellationToken::new());
    (request, agent_request)
}

//! Agent registry.

use super::{AgentError, AgentRequest, ChatAgent};
use chatwire_domain::AgentDescriptor;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Registered chat agents, in registration order.
///
/// Agents may be registered after the service is shared, so agents that
/// delegate (and therefore hold a handle to this service) can be added
/// to it too.
#[derive(Default)]
pub struct ChatAgentService {
    agents: RwLock<Vec<Arc<dyn ChatAgent>>>,
}

impl ChatAgentService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent. An agent with the same id replaces the old one
    /// in place.
    pub fn register(&self, agent: Arc<dyn ChatAgent>) {
        let mut agents = self.agents.write().unwrap_or_else(|e| e.into_inner());
        debug!(agent = %agent.id(), "Registering chat agent");
        match agents.iter_mut().find(|a| a.id() == agent.id()) {
            Some(existing) => *existing = agent,
            None => agents.push(agent),
        }
    }

    pub fn unregister(&self, id: &str) -> Option<Arc<dyn ChatAgent>> {
        let mut agents = self.agents.write().unwrap_or_else(|e| e.into_inner());
        let pos = agents.iter().position(|a| a.id() == id)?;
        Some(agents.remove(pos))
    }

    pub fn get_agent(&self, id: &str) -> Option<Arc<dyn ChatAgent>> {
        self.agents
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|a| a.id() == id)
            .cloned()
    }

    pub fn agents(&self) -> Vec<Arc<dyn ChatAgent>> {
        self.agents.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn descriptors(&self) -> Vec<AgentDescriptor> {
        self.agents()
            .iter()
            .map(|a| a.descriptor().clone())
            .collect()
    }

    /// Invoke the agent registered as `id` on `request`.
    pub async fn invoke_agent(&self, id: &str, request: AgentRequest) -> Result<(), AgentError> {
        let agent = self
            .get_agent(id)
            .ok_or_else(|| AgentError::UnknownAgent(id.to_string()))?;
        agent.invoke(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{EchoAgent, agent_request};

    #[test]
    fn agents_keep_registration_order() {
        let service = ChatAgentService::new();
        service.register(Arc::new(EchoAgent::new("b")));
        service.register(Arc::new(EchoAgent::new("a")));

        let ids: Vec<_> = service.agents().iter().map(|a| a.id().to_string()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert!(service.get_agent("a").is_some());
        assert!(service.get_agent("c").is_none());
    }

    #[test]
    fn same_id_replaces_in_place() {
        let service = ChatAgentService::new();
        service.register(Arc::new(EchoAgent::new("a")));
        service.register(Arc::new(EchoAgent::new("b")));
        service.register(Arc::new(EchoAgent::with_reply("a", "second")));

        assert_eq!(service.agents().len(), 2);
        assert_eq!(service.agents()[0].id(), "a");
        assert!(service.unregister("a").is_some());
        assert_eq!(service.agents().len(), 1);
    }

    #[tokio::test]
    async fn invoke_unknown_agent_fails() {
        let service = ChatAgentService::new();
        let (_, request) = agent_request("hi");
        let err = service.invoke_agent("missing", request).await.unwrap_err();
        assert!(matches!(err, AgentError::UnknownAgent(id) if id == "missing"));
    }

    #[tokio::test]
    async fn invoke_routes_to_agent() {
        let service = ChatAgentService::new();
        service.register(Arc::new(EchoAgent::with_reply("echo", "pong")));
        let (req, request) = agent_request("ping");

        service.invoke_agent("echo", request).await.unwrap();
        assert_eq!(req.response().as_string(), "pong");
        assert!(req.response().is_complete());
    }
}

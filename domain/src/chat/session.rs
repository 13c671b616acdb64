//! Chat sessions: ordered request history.

use crate::chat::request::{ChatRequestModel, ParsedChatRequest};
use crate::util::generate_id;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Why a request left its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RemovalReason {
    /// Deleted by the user.
    Removal,
    /// Removed so it can be sent again.
    Resend,
    /// Moved into another session.
    Adoption,
}

/// Speaker of a [`ChatMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// A role-tagged message sent to a language model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// A conversation: requests in submission order.
#[derive(Debug)]
pub struct ChatSession {
    id: String,
    requests: Mutex<Vec<Arc<ChatRequestModel>>>,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            id: generate_id(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<ChatRequestModel>>> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Create a request model for `message` and append it.
    pub fn add_request(
        &self,
        message: ParsedChatRequest,
        agent_id: Option<String>,
    ) -> Arc<ChatRequestModel> {
        let request = Arc::new(ChatRequestModel::new(self.id.clone(), message, agent_id));
        self.lock().push(Arc::clone(&request));
        request
    }

    pub fn get_request(&self, request_id: &str) -> Option<Arc<ChatRequestModel>> {
        self.lock().iter().find(|r| r.id() == request_id).cloned()
    }

    pub fn requests(&self) -> Vec<Arc<ChatRequestModel>> {
        self.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Remove a request. A removed request that is still running is canceled.
    pub fn remove_request(
        &self,
        request_id: &str,
        reason: RemovalReason,
    ) -> Option<Arc<ChatRequestModel>> {
        let removed = {
            let mut requests = self.lock();
            let pos = requests.iter().position(|r| r.id() == request_id)?;
            requests.remove(pos)
        };
        debug!(session = %self.id, request = %request_id, ?reason, "Removed request");
        if reason != RemovalReason::Adoption {
            removed.response().cancel();
        }
        Some(removed)
    }

    /// Drop every request, canceling those still running.
    pub fn clear(&self) {
        let drained: Vec<_> = self.lock().drain(..).collect();
        for request in &drained {
            request.response().cancel();
        }
    }

    /// Prior turns as language-model messages, excluding `current` and any
    /// request after it. Canceled or empty responses contribute only their
    /// user message.
    pub fn history(&self, current: Option<&str>) -> Vec<ChatMessage> {
        let mut messages = Vec::new();
        for request in self.lock().iter() {
            if Some(request.id()) == current {
                break;
            }
            messages.push(ChatMessage::user(request.request().text.clone()));
            let response = request.response();
            if response.is_complete() && !response.is_canceled() {
                let text = response.as_string();
                if !text.is_empty() {
                    messages.push(ChatMessage::assistant(text));
                }
            }
        }
        messages
    }
}

//! Response accumulation.
//!
//! [`ChatResponse`] is the ordered content list with its flattened text view.
//! [`ChatResponseModel`] wraps it with the completion state machine, progress
//! messages and change notification. It is shared (`Arc`) between the agent
//! producing the response and whoever renders it, so all mutation goes
//! through `&self` and an internal lock.
//!
//! ```text
//! Pending ──mark_started──▶ Running ──complete──▶ Complete
//!    │                        │
//!    └────────cancel──────────┴──────cancel─────▶ Canceled
//! ```

use crate::chat::content::ResponseContent;
use crate::core::error::ResponseError;
use crate::message::QuestionOption;
use crate::util::generate_id;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::warn;

/// Separator between fragments in the flattened response string.
const FRAGMENT_SEPARATOR: &str = "\n\n";

/// Ordered, mergeable response content and its text rendering.
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    content: Vec<ResponseContent>,
    representation: String,
}

impl ChatResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(&self) -> &[ResponseContent] {
        &self.content
    }

    /// The flattened text view, recomputed after every mutation.
    pub fn as_string(&self) -> &str {
        &self.representation
    }

    /// Append `next`, merging it into the last fragment when both share a
    /// kind and the merge succeeds.
    pub fn add_content(&mut self, next: ResponseContent) {
        let merged = match self.content.last_mut() {
            Some(last) if last.kind() == next.kind() && last.supports_merge() => last.merge(&next),
            _ => false,
        };
        if !merged {
            self.content.push(next);
        }
        self.update_representation();
    }

    /// Record `option` as the answer to the newest unanswered question.
    pub fn select_answer(&mut self, option: QuestionOption) -> bool {
        let question = self.content.iter_mut().rev().find_map(|item| match item {
            ResponseContent::Question(q) if q.selected.is_none() => Some(q),
            _ => None,
        });
        match question {
            Some(q) => {
                q.selected = Some(option);
                true
            }
            None => false,
        }
    }

    /// Remove and return the newest fragment.
    pub fn pop_content(&mut self) -> Option<ResponseContent> {
        let popped = self.content.pop();
        self.update_representation();
        popped
    }

    fn update_representation(&mut self) {
        self.representation = self
            .content
            .iter()
            .filter_map(|item| {
                let text = item.as_string();
                if text.is_none() {
                    warn!(
                        kind = %item.kind(),
                        "Was not able to map response content to a string"
                    );
                }
                text
            })
            .collect::<Vec<_>>()
            .join(FRAGMENT_SEPARATOR);
    }
}

/// Status of a [`ProgressMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProgressStatus {
    InProgress,
    Completed,
    Failed,
}

/// A transient status line shown while a response is being produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressMessage {
    pub id: String,
    pub content: String,
    pub status: ProgressStatus,
}

/// Lifecycle state of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResponseState {
    Pending,
    Running,
    Complete,
    Canceled,
}

impl ResponseState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ResponseState::Complete | ResponseState::Canceled)
    }
}

/// What changed in a [`ChatResponseModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseChange {
    Started,
    ContentAdded,
    QuestionAnswered,
    ProgressUpdated,
    AgentChanged,
    Completed,
    Canceled,
}

/// Handle returned by [`ChatResponseModel::on_change`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type ChangeListener = Arc<dyn Fn(ResponseChange) + Send + Sync>;

#[derive(Debug, Default)]
struct ResponseInner {
    response: ChatResponse,
    progress_messages: Vec<ProgressMessage>,
    agent_id: Option<String>,
    started: bool,
    is_complete: bool,
    is_canceled: bool,
}

/// The response to one chat request.
pub struct ChatResponseModel {
    id: String,
    request_id: String,
    inner: Mutex<ResponseInner>,
    listeners: Mutex<Vec<(ListenerId, ChangeListener)>>,
    next_listener: AtomicU64,
}

impl std::fmt::Debug for ChatResponseModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatResponseModel")
            .field("id", &self.id)
            .field("request_id", &self.request_id)
            .field("state", &self.state())
            .finish()
    }
}

impl ChatResponseModel {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            request_id: request_id.into(),
            inner: Mutex::new(ResponseInner::default()),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    fn lock(&self) -> MutexGuard<'_, ResponseInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a change listener. Listeners run synchronously after the
    /// mutation, outside the internal lock, so they may read the model.
    pub fn on_change(&self, listener: impl Fn(ResponseChange) + Send + Sync + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, Arc::new(listener)));
        id
    }

    pub fn remove_listener(&self, id: ListenerId) {
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|(listener_id, _)| *listener_id != id);
    }

    fn fire(&self, change: ResponseChange) {
        let listeners: Vec<ChangeListener> = self
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(change);
        }
    }

    /// Append a fragment. Rejected once the response is complete.
    pub fn add_content(&self, content: ResponseContent) -> Result<(), ResponseError> {
        {
            let mut inner = self.lock();
            if inner.is_complete {
                return Err(ResponseError::Closed(self.id.clone()));
            }
            inner.response.add_content(content);
        }
        self.fire(ResponseChange::ContentAdded);
        Ok(())
    }

    /// Append several fragments in order, firing one notification.
    pub fn add_contents(
        &self,
        contents: impl IntoIterator<Item = ResponseContent>,
    ) -> Result<(), ResponseError> {
        {
            let mut inner = self.lock();
            if inner.is_complete {
                return Err(ResponseError::Closed(self.id.clone()));
            }
            for content in contents {
                inner.response.add_content(content);
            }
        }
        self.fire(ResponseChange::ContentAdded);
        Ok(())
    }

    /// Remove the newest fragment so it can be replaced.
    pub fn pop_content(&self) -> Option<ResponseContent> {
        let popped = {
            let mut inner = self.lock();
            if inner.is_complete {
                return None;
            }
            inner.response.pop_content()
        };
        if popped.is_some() {
            self.fire(ResponseChange::ContentAdded);
        }
        popped
    }

    /// Record the user's answer to the pending question. Returns `false`
    /// when there is no unanswered question.
    pub fn select_answer(&self, option: QuestionOption) -> bool {
        let selected = self.lock().response.select_answer(option);
        if selected {
            self.fire(ResponseChange::QuestionAnswered);
        }
        selected
    }

    /// Mark the response as being produced by an agent.
    pub fn mark_started(&self) {
        {
            let mut inner = self.lock();
            if inner.started || inner.is_complete {
                return;
            }
            inner.started = true;
        }
        self.fire(ResponseChange::Started);
    }

    /// Mark the response complete. Returns `false` (and notifies nobody)
    /// when it already was.
    pub fn complete(&self) -> bool {
        {
            let mut inner = self.lock();
            if inner.is_complete {
                return false;
            }
            inner.is_complete = true;
        }
        self.fire(ResponseChange::Completed);
        true
    }

    /// Mark the response canceled (and therefore complete). Returns `false`
    /// when the response was already in a terminal state.
    pub fn cancel(&self) -> bool {
        {
            let mut inner = self.lock();
            if inner.is_complete {
                return false;
            }
            inner.is_complete = true;
            inner.is_canceled = true;
        }
        self.fire(ResponseChange::Canceled);
        true
    }

    pub fn is_complete(&self) -> bool {
        self.lock().is_complete
    }

    pub fn is_canceled(&self) -> bool {
        self.lock().is_canceled
    }

    pub fn state(&self) -> ResponseState {
        let inner = self.lock();
        if inner.is_canceled {
            ResponseState::Canceled
        } else if inner.is_complete {
            ResponseState::Complete
        } else if inner.started {
            ResponseState::Running
        } else {
            ResponseState::Pending
        }
    }

    /// Snapshot of the content fragments.
    pub fn content(&self) -> Vec<ResponseContent> {
        self.lock().response.content().to_vec()
    }

    /// The flattened text view of the response.
    pub fn as_string(&self) -> String {
        self.lock().response.as_string().to_string()
    }

    /// Add a progress message in the `InProgress` state.
    pub fn add_progress_message(&self, content: impl Into<String>) -> ProgressMessage {
        let message = ProgressMessage {
            id: generate_id(),
            content: content.into(),
            status: ProgressStatus::InProgress,
        };
        self.lock().progress_messages.push(message.clone());
        self.fire(ResponseChange::ProgressUpdated);
        message
    }

    pub fn update_progress_message(
        &self,
        id: &str,
        status: ProgressStatus,
    ) -> Result<(), ResponseError> {
        {
            let mut inner = self.lock();
            let message = inner
                .progress_messages
                .iter_mut()
                .find(|m| m.id == id)
                .ok_or_else(|| ResponseError::UnknownProgressMessage(id.to_string()))?;
            message.status = status;
        }
        self.fire(ResponseChange::ProgressUpdated);
        Ok(())
    }

    /// Set the status of every progress message at once.
    pub fn settle_progress_messages(&self, status: ProgressStatus) {
        {
            let mut inner = self.lock();
            if inner.progress_messages.is_empty() {
                return;
            }
            for message in inner.progress_messages.iter_mut() {
                message.status = status;
            }
        }
        self.fire(ResponseChange::ProgressUpdated);
    }

    pub fn progress_messages(&self) -> Vec<ProgressMessage> {
        self.lock().progress_messages.clone()
    }

    /// The agent that ended up answering, if it differs from the one
    /// selected at dispatch time.
    pub fn agent_id(&self) -> Option<String> {
        self.lock().agent_id.clone()
    }

    pub fn override_agent_id(&self, agent_id: impl Into<String>) {
        self.lock().agent_id = Some(agent_id.into());
        self.fire(ResponseChange::AgentChanged);
    }
}

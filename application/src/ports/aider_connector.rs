//! Aider connector port
//!
//! The connector owns one external Aider process. Text sent with
//! [`AiderConnector::send_message`] is written to the process; everything
//! the process reports comes back to the registered [`AiderClient`] as
//! [`ConnectorEvent`]s, in the order it was produced.

use async_trait::async_trait;
use chatwire_domain::DemuxEvent;
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by an [`AiderConnector`].
#[derive(Error, Debug)]
pub enum ConnectorError {
    #[error("Failed to start Aider: {0}")]
    StartFailed(String),

    #[error("Aider did not report readiness within {0} seconds")]
    StartTimeout(u64),

    #[error("Aider process has exited (code: {0:?})")]
    ProcessExited(Option<i32>),

    #[error("Write to Aider failed: {0}")]
    Write(String),

    #[error("Aider sent a malformed payload: {0}")]
    InvalidPayload(String),
}

/// Something the external process reported.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectorEvent {
    /// The startup banner was seen; the process accepts input.
    Started,
    /// Demultiplexed output: data, a structured message or end of turn.
    Output(DemuxEvent),
    /// An error line on stderr. The process keeps running.
    Error(String),
    /// A question payload that could not be parsed. Output after it in the
    /// same chunk has already been delivered.
    InvalidPayload(String),
    /// The process exited.
    Closed { code: Option<i32> },
}

/// Receiver of connector events.
///
/// Called from the connector's forwarding task, one event at a time.
pub trait AiderClient: Send + Sync {
    fn on_event(&self, event: ConnectorEvent);
}

#[async_trait]
pub trait AiderConnector: Send + Sync {
    /// Register the client that receives all further events.
    fn set_client(&self, client: Arc<dyn AiderClient>);

    /// Start the process if it is not running and wait for its banner.
    async fn start(&self) -> Result<(), ConnectorError>;

    /// Send one line of input, starting the process first if needed.
    async fn send_message(&self, text: &str) -> Result<(), ConnectorError>;

    /// Add files to the Aider chat. Empty and missing entries are skipped.
    async fn add(&self, paths: &[Option<String>]) -> Result<(), ConnectorError>;
}

//! AiderConnector implementation backed by [`AiderProcess`]

use super::error::AiderError;
use super::process::{AiderProcess, AiderProcessConfig};
use async_trait::async_trait;
use chatwire_application::ports::aider_connector::{
    AiderClient, AiderConnector, ConnectorError, ConnectorEvent,
};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard, mpsc};
use tracing::{debug, info, warn};

pub const DEFAULT_START_TIMEOUT: Duration = Duration::from_secs(60);

type SharedClient = Arc<RwLock<Option<Arc<dyn AiderClient>>>>;

/// Owns at most one Aider process.
///
/// The process is started lazily by the first `send_message` or `add`. Once
/// it has exited, writes fail with [`ConnectorError::ProcessExited`] until
/// [`AiderConnector::start`] is called again; there is no automatic
/// restart.
pub struct AiderConnectorImpl {
    config: AiderProcessConfig,
    start_timeout: Duration,
    client: SharedClient,
    process: Mutex<Option<AiderProcess>>,
}

impl AiderConnectorImpl {
    pub fn new(config: AiderProcessConfig) -> Self {
        Self {
            config,
            start_timeout: DEFAULT_START_TIMEOUT,
            client: Arc::new(RwLock::new(None)),
            process: Mutex::new(None),
        }
    }

    pub fn with_start_timeout(mut self, timeout: Duration) -> Self {
        self.start_timeout = timeout;
        self
    }

    pub fn config(&self) -> &AiderProcessConfig {
        &self.config
    }

    /// Spawn a fresh process with its own event forwarder and wait for the
    /// banner. The caller holds the process lock.
    async fn spawn_process(&self) -> Result<AiderProcess, AiderError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let process = AiderProcess::spawn(&self.config, tx)?;
        tokio::spawn(forward_events(rx, Arc::clone(&self.client)));

        if let Err(e) = process.wait_started(self.start_timeout).await {
            warn!(error = %e, "Aider failed to start");
            process.kill();
            return Err(e);
        }
        info!("Aider is ready");
        Ok(process)
    }

    /// Lock the process slot, starting a process if there never was one.
    async fn live_process(&self) -> Result<MutexGuard<'_, Option<AiderProcess>>, ConnectorError> {
        let mut guard = self.process.lock().await;
        if guard.is_none() {
            *guard = Some(self.spawn_process().await?);
        }
        Ok(guard)
    }
}

#[async_trait]
impl AiderConnector for AiderConnectorImpl {
    fn set_client(&self, client: Arc<dyn AiderClient>) {
        *self.client.write().unwrap_or_else(|e| e.into_inner()) = Some(client);
    }

    async fn start(&self) -> Result<(), ConnectorError> {
        let mut guard = self.process.lock().await;
        if let Some(process) = guard.as_ref() {
            if process.is_running() {
                debug!("Aider already running");
                return Ok(());
            }
        }
        *guard = None;
        *guard = Some(self.spawn_process().await?);
        Ok(())
    }

    async fn send_message(&self, text: &str) -> Result<(), ConnectorError> {
        let guard = self.live_process().await?;
        let process = guard.as_ref().ok_or(ConnectorError::ProcessExited(None))?;
        process.write(text).await?;
        Ok(())
    }

    async fn add(&self, paths: &[Option<String>]) -> Result<(), ConnectorError> {
        let guard = self.live_process().await?;
        let process = guard.as_ref().ok_or(ConnectorError::ProcessExited(None))?;
        process.add(paths).await?;
        Ok(())
    }
}

/// Deliver events to whichever client is registered at the time.
async fn forward_events(mut rx: mpsc::UnboundedReceiver<ConnectorEvent>, client: SharedClient) {
    while let Some(event) = rx.recv().await {
        let current = client.read().unwrap_or_else(|e| e.into_inner()).clone();
        match current {
            Some(client) => client.on_event(event),
            None => debug!(?event, "No Aider client registered, dropping event"),
        }
    }
}

//! The Aider child process
//!
//! [`AiderProcess::spawn`] starts `command [wrapper] args...` in the
//! workspace directory and runs three background tasks:
//!
//! - a stdout reader that waits for the startup banner and then feeds every
//!   chunk through an [`AiderDemuxer`]
//! - a stderr reader that classifies chunks with a [`RepoScanDetector`]
//! - a waiter that reports the exit once both readers are drained
//!
//! Everything is reported as [`ConnectorEvent`]s on one channel, in order.

use super::demux::{AiderDemuxer, DemuxError};
use super::error::{AiderError, Result};
use super::progress::{RepoScanDetector, StderrLine};
use chatwire_application::ports::aider_connector::ConnectorEvent;
use chatwire_domain::DemuxEvent;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{Mutex, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Banner the wrapper prints once it accepts input.
pub const DEFAULT_BANNER: &str = "Theia Wrapper started";

const READ_BUFFER: usize = 8192;

/// How to launch Aider.
#[derive(Debug, Clone)]
pub struct AiderProcessConfig {
    /// Program to run, resolved through `PATH`.
    pub command: String,
    /// Wrapper script passed as the first argument, if any.
    pub wrapper: Option<PathBuf>,
    pub args: Vec<String>,
    /// Working directory; the current directory when unset.
    pub workspace: Option<PathBuf>,
    pub banner: String,
}

impl Default for AiderProcessConfig {
    fn default() -> Self {
        Self {
            command: "python3".to_string(),
            wrapper: None,
            args: Vec::new(),
            workspace: None,
            banner: DEFAULT_BANNER.to_string(),
        }
    }
}

/// Lifecycle of one process instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    /// Spawned, banner not seen yet.
    Starting,
    Running,
    Exited(Option<i32>),
}

pub struct AiderProcess {
    stdin: Mutex<ChildStdin>,
    status: watch::Receiver<ProcessStatus>,
    shutdown: CancellationToken,
}

impl AiderProcess {
    /// Spawn the process. Events go to `events` until the process exits.
    pub fn spawn(
        config: &AiderProcessConfig,
        events: mpsc::UnboundedSender<ConnectorEvent>,
    ) -> Result<Self> {
        let program = which::which(&config.command)
            .map_err(|_| AiderError::CommandNotFound(config.command.clone()))?;
        // Fail before spawning if the patterns are broken
        let detector = RepoScanDetector::new()?;

        debug!(command = %program.display(), wrapper = ?config.wrapper, "Spawning Aider");

        let mut cmd = Command::new(&program);
        if let Some(wrapper) = &config.wrapper {
            cmd.arg(wrapper);
        }
        cmd.args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &config.workspace {
            cmd.current_dir(dir);
        }

        // Linux: request kernel to send SIGTERM to child when parent dies.
        #[cfg(target_os = "linux")]
        unsafe {
            cmd.pre_exec(|| {
                libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM);
                Ok(())
            });
        }

        let mut child = cmd.spawn()?;
        let stdin = child.stdin.take().ok_or(AiderError::MissingPipe("stdin"))?;
        let stdout = child.stdout.take().ok_or(AiderError::MissingPipe("stdout"))?;
        let stderr = child.stderr.take().ok_or(AiderError::MissingPipe("stderr"))?;
        info!(pid = ?child.id(), "Aider process spawned");

        let (status_tx, status_rx) = watch::channel(ProcessStatus::Starting);
        let shutdown = CancellationToken::new();

        let stdout_task = tokio::spawn(Self::stdout_loop(
            stdout,
            config.banner.clone(),
            events.clone(),
            status_tx.clone(),
        ));
        let stderr_task = tokio::spawn(Self::stderr_loop(stderr, detector, events.clone()));

        let token = shutdown.clone();
        tokio::spawn(async move {
            let code = Self::wait_for_exit(child, token).await;
            let _ = stdout_task.await;
            let _ = stderr_task.await;
            info!(?code, "Aider process exited");
            status_tx.send_replace(ProcessStatus::Exited(code));
            let _ = events.send(ConnectorEvent::Closed { code });
        });

        Ok(Self {
            stdin: Mutex::new(stdin),
            status: status_rx,
            shutdown,
        })
    }

    pub fn status(&self) -> ProcessStatus {
        *self.status.borrow()
    }

    pub fn is_running(&self) -> bool {
        !matches!(self.status(), ProcessStatus::Exited(_))
    }

    /// Wait until the banner is seen or the process exits.
    pub async fn wait_started(&self, timeout: Duration) -> Result<()> {
        let mut status = self.status.clone();
        let waited = tokio::time::timeout(
            timeout,
            status.wait_for(|s| *s != ProcessStatus::Starting),
        )
        .await
        .map_err(|_| AiderError::StartTimeout(timeout.as_secs()))?;

        match waited.map(|s| *s) {
            Ok(ProcessStatus::Running) => Ok(()),
            Ok(ProcessStatus::Exited(code)) => Err(AiderError::ProcessExited(code)),
            Ok(ProcessStatus::Starting) | Err(_) => Err(AiderError::ProcessExited(None)),
        }
    }

    /// Write one line to the process. Waits while the pipe is full.
    pub async fn write(&self, text: &str) -> Result<()> {
        if let ProcessStatus::Exited(code) = self.status() {
            return Err(AiderError::ProcessExited(code));
        }
        let mut stdin = self.stdin.lock().await;
        let line = format!("{}\n", text);
        let mut written = stdin.write_all(line.as_bytes()).await;
        if written.is_ok() {
            written = stdin.flush().await;
        }

        match written {
            Ok(()) => {
                trace!(bytes = line.len(), "Wrote to Aider");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                let code = match self.status() {
                    ProcessStatus::Exited(code) => code,
                    _ => None,
                };
                Err(AiderError::ProcessExited(code))
            }
            Err(e) => Err(AiderError::WriteFailed(e)),
        }
    }

    /// Add files to the chat with `/add`. Empty and missing entries are
    /// skipped; nothing is written when none remain.
    pub async fn add(&self, paths: &[Option<String>]) -> Result<()> {
        match add_command(paths) {
            Some(line) => self.write(&line).await,
            None => Ok(()),
        }
    }

    /// Kill the process. Its exit is still reported through the events.
    pub fn kill(&self) {
        self.shutdown.cancel();
    }

    async fn wait_for_exit(mut child: Child, shutdown: CancellationToken) -> Option<i32> {
        let status = tokio::select! {
            status = child.wait() => status,
            _ = shutdown.cancelled() => {
                debug!("Killing Aider process");
                let _ = child.start_kill();
                child.wait().await
            }
        };
        match status {
            Ok(status) => status.code(),
            Err(e) => {
                warn!(error = %e, "Failed to wait for Aider process");
                None
            }
        }
    }

    async fn stdout_loop(
        stdout: impl AsyncRead + Unpin,
        banner: String,
        events: mpsc::UnboundedSender<ConnectorEvent>,
        status: watch::Sender<ProcessStatus>,
    ) {
        let mut gate = BannerGate::new(banner);
        let mut demuxer = AiderDemuxer::new();
        let mut decoder = Utf8Decoder::default();

        Self::read_chunks(stdout, &mut decoder, |chunk| {
            let Some(chunk) = gate.pass(chunk) else {
                return;
            };
            if gate.just_opened() {
                status.send_replace(ProcessStatus::Running);
                let _ = events.send(ConnectorEvent::Started);
            }
            if chunk.is_empty() {
                return;
            }
            for event in demux_chunk(&mut demuxer, &chunk) {
                let _ = events.send(event);
            }
        })
        .await;
        debug!("Aider stdout closed");
    }

    async fn stderr_loop(
        stderr: impl AsyncRead + Unpin,
        mut detector: RepoScanDetector,
        events: mpsc::UnboundedSender<ConnectorEvent>,
    ) {
        let mut decoder = Utf8Decoder::default();
        Self::read_chunks(stderr, &mut decoder, |chunk| match detector.classify(&chunk) {
            StderrLine::Progress(message) => {
                let _ = events.send(ConnectorEvent::Output(DemuxEvent::Message(message)));
            }
            StderrLine::Suppressed => {}
            StderrLine::Error(text) => {
                error!("Aider: {}", text.trim_end());
                let _ = events.send(ConnectorEvent::Error(text));
            }
        })
        .await;
        debug!("Aider stderr closed");
    }

    async fn read_chunks(
        mut reader: impl AsyncRead + Unpin,
        decoder: &mut Utf8Decoder,
        mut on_chunk: impl FnMut(String),
    ) {
        let mut buf = vec![0u8; READ_BUFFER];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    let text = decoder.decode(&buf[..n]);
                    if !text.is_empty() {
                        on_chunk(text);
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Read from Aider failed");
                    break;
                }
            }
        }
        let rest = decoder.finish();
        if !rest.is_empty() {
            on_chunk(rest);
        }
    }
}

impl Drop for AiderProcess {
    fn drop(&mut self) {
        debug!("AiderProcess dropping, killing child process");
        self.shutdown.cancel();
    }
}

/// Run one chunk through the demuxer, reporting a malformed question in
/// the position it occurred.
fn demux_chunk(demuxer: &mut AiderDemuxer, chunk: &str) -> Vec<ConnectorEvent> {
    let mut out = Vec::new();
    let failure = demuxer.feed(chunk, &mut out).err();
    let mut events: Vec<ConnectorEvent> = out.into_iter().map(ConnectorEvent::Output).collect();
    if let Some(DemuxError::InvalidQuestion {
        payload, position, ..
    }) = failure
    {
        events.insert(position.min(events.len()), ConnectorEvent::InvalidPayload(payload));
    }
    events
}

/// Format the `/add` command line.
pub fn add_command(paths: &[Option<String>]) -> Option<String> {
    let paths: Vec<&str> = paths
        .iter()
        .flatten()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect();
    if paths.is_empty() {
        None
    } else {
        Some(format!("/add {}", paths.join(" ")))
    }
}

/// Holds stdout back until the banner shows up. Output before it is
/// discarded; the rest of the banner's line is dropped too.
struct BannerGate {
    banner: String,
    seen: String,
    open: bool,
    just_opened: bool,
}

impl BannerGate {
    fn new(banner: String) -> Self {
        Self {
            banner,
            seen: String::new(),
            open: false,
            just_opened: false,
        }
    }

    fn just_opened(&self) -> bool {
        self.just_opened
    }

    /// Returns the part of `chunk` past the banner, or `None` while closed.
    fn pass(&mut self, chunk: String) -> Option<String> {
        self.just_opened = false;
        if self.open {
            return Some(chunk);
        }

        self.seen.push_str(&chunk);
        let Some(at) = self.seen.find(&self.banner) else {
            trace!(len = chunk.len(), "Discarding output before banner");
            self.keep_tail();
            return None;
        };

        let after = at + self.banner.len();
        let rest = match self.seen[after..].find('\n') {
            Some(nl) => self.seen[after + nl + 1..].to_string(),
            None => String::new(),
        };
        self.seen = String::new();
        self.open = true;
        self.just_opened = true;
        Some(rest)
    }

    /// Keep just enough to match a banner split across reads.
    fn keep_tail(&mut self) {
        let keep = self.banner.len();
        if self.seen.len() <= keep {
            return;
        }
        let mut cut = self.seen.len() - keep;
        while !self.seen.is_char_boundary(cut) {
            cut += 1;
        }
        self.seen.drain(..cut);
    }
}

/// Decodes a byte stream as UTF-8 across read boundaries.
#[derive(Default)]
struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let valid = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            // An incomplete sequence at the end waits for the next read
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(_) => {
                let text = String::from_utf8_lossy(&self.pending).into_owned();
                self.pending.clear();
                return text;
            }
        };
        let rest = self.pending.split_off(valid);
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending = rest;
        text
    }

    fn finish(&mut self) -> String {
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        text
    }
}

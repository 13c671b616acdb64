//! Repo-scan progress detection on Aider's stderr

use chatwire_domain::Message;
use regex::Regex;
use tracing::trace;

/// Text of the progress message for the initial repository scan.
pub const REPO_SCAN_TEXT: &str =
    "Initial repo scan can be slow in larger repos, but only happens once";

const SCAN_STARTED: &str =
    r"\s*Initial repo scan can be slow in larger repos, but only happens once\.";
const SCAN_FINISHED: &str = r"\s*Scanning repo: 100%\|.+\| \d+/\d+";

/// What a chunk of stderr means.
#[derive(Debug, Clone, PartialEq)]
pub enum StderrLine {
    /// A progress update to forward as a message.
    Progress(Message),
    /// Scan output that is neither start nor end.
    Suppressed,
    /// Anything else: a real error report.
    Error(String),
}

/// Classifies stderr chunks. Stateful: between the start and the end of a
/// scan all other output is suppressed.
#[derive(Debug)]
pub struct RepoScanDetector {
    started: Regex,
    finished: Regex,
    scanning: bool,
}

impl RepoScanDetector {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            started: Regex::new(SCAN_STARTED)?,
            finished: Regex::new(SCAN_FINISHED)?,
            scanning: false,
        })
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning
    }

    pub fn classify(&mut self, chunk: &str) -> StderrLine {
        if let Some(start) = self.started.find(chunk) {
            // small repos finish within the same read
            let done = self.finished.is_match(&chunk[start.end()..]);
            self.scanning = !done;
            return StderrLine::Progress(Message::progress(REPO_SCAN_TEXT, done));
        }
        if self.scanning && self.finished.is_match(chunk) {
            self.scanning = false;
            return StderrLine::Progress(Message::progress(REPO_SCAN_TEXT, true));
        }
        if self.scanning {
            trace!(len = chunk.len(), "Suppressing scan output");
            return StderrLine::Suppressed;
        }
        StderrLine::Error(chunk.to_string())
    }
}

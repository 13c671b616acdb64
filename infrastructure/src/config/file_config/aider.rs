//! Aider configuration from TOML (`[aider]` section)

use crate::aider::process::{AiderProcessConfig, DEFAULT_BANNER};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Raw Aider configuration from TOML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileAiderConfig {
    /// Register the Aider agent
    pub enabled: bool,
    /// Interpreter or executable to run
    pub command: String,
    /// Path to the chat wrapper script
    pub wrapper: Option<String>,
    /// Extra arguments passed after the wrapper
    pub args: Vec<String>,
    /// Working directory (default: current directory)
    pub workspace: Option<String>,
    /// Line that marks the wrapper as ready
    pub banner: String,
    /// Seconds to wait for the banner
    pub start_timeout_seconds: u64,
}

impl Default for FileAiderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: "python3".to_string(),
            wrapper: None,
            args: Vec::new(),
            workspace: None,
            banner: DEFAULT_BANNER.to_string(),
            start_timeout_seconds: 60,
        }
    }
}

impl FileAiderConfig {
    pub fn to_process_config(&self) -> AiderProcessConfig {
        AiderProcessConfig {
            command: self.command.clone(),
            wrapper: self.wrapper.as_ref().map(PathBuf::from),
            args: self.args.clone(),
            workspace: self.workspace.as_ref().map(PathBuf::from),
            banner: self.banner.clone(),
        }
    }

    pub fn start_timeout(&self) -> Duration {
        Duration::from_secs(self.start_timeout_seconds)
    }
}

//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! Every section has defaults, so an empty file is a valid configuration.

mod aider;
mod chat;
mod commands;
mod logging;
mod openai;

pub use aider::FileAiderConfig;
pub use chat::FileChatConfig;
pub use commands::FileCommandConfig;
pub use logging::FileLoggingConfig;
pub use openai::FileOpenAiConfig;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Configuration validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigValidationError {
    #[error("aider.start_timeout_seconds cannot be 0")]
    InvalidTimeout,

    #[error("aider.command cannot be empty")]
    EmptyAiderCommand,

    #[error("openai model name cannot be empty")]
    EmptyModelName,

    #[error("command id cannot be empty")]
    EmptyCommandId,

    #[error("command '{0}' is listed more than once")]
    DuplicateCommand(String),
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Agent selection
    pub chat: FileChatConfig,
    /// Aider process
    pub aider: FileAiderConfig,
    /// OpenAI-compatible language model
    pub openai: FileOpenAiConfig,
    /// Commands offered to the command agent
    pub commands: Vec<FileCommandConfig>,
    pub logging: FileLoggingConfig,
}

impl FileConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.aider.start_timeout_seconds == 0 {
            return Err(ConfigValidationError::InvalidTimeout);
        }
        if self.aider.enabled && self.aider.command.trim().is_empty() {
            return Err(ConfigValidationError::EmptyAiderCommand);
        }

        if self.openai.model.trim().is_empty()
            || self.openai.purposes.values().any(|m| m.trim().is_empty())
        {
            return Err(ConfigValidationError::EmptyModelName);
        }

        let mut seen = HashSet::new();
        for command in &self.commands {
            if command.id.trim().is_empty() {
                return Err(ConfigValidationError::EmptyCommandId);
            }
            if !seen.insert(command.id.as_str()) {
                return Err(ConfigValidationError::DuplicateCommand(command.id.clone()));
            }
        }

        Ok(())
    }
}

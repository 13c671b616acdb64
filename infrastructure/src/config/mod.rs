//! Configuration file loading for chatwire
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `CHATWIRE_` environment variables (`CHATWIRE_CHAT__DEFAULT_AGENT=Aider`)
//! 2. `--config <path>` specified file
//! 3. Project root: `./chatwire.toml` or `./.chatwire.toml`
//! 4. XDG config: `$XDG_CONFIG_HOME/chatwire/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    ConfigValidationError, FileAiderConfig, FileChatConfig, FileCommandConfig, FileConfig,
    FileLoggingConfig, FileOpenAiConfig,
};
pub use loader::ConfigLoader;

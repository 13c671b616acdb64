//! Infrastructure layer for chatwire
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer: the Aider process connector, language model
//! providers, the command registry, configuration file loading and the
//! conversation logger.

pub mod aider;
pub mod commands;
pub mod config;
pub mod logging;
pub mod providers;

// Re-export commonly used types
pub use aider::{
    connector::AiderConnectorImpl,
    demux::{AiderDemuxer, DemuxError},
    error::AiderError,
    process::{AiderProcess, AiderProcessConfig},
    progress::RepoScanDetector,
};
pub use commands::StaticCommandRegistry;
pub use config::{ConfigLoader, ConfigValidationError, FileConfig};
pub use logging::JsonlConversationLogger;
#[cfg(feature = "openai")]
pub use providers::openai::{OpenAiError, OpenAiModel};
pub use providers::PurposeRouter;

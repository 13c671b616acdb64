//! Presentation layer for chatwire
//!
//! This crate contains the CLI definition, the console formatter for
//! response content and the interactive chat REPL.

pub mod chat;
pub mod cli;
pub mod output;

// Re-export commonly used types
pub use chat::{ChatRepl, ResponseView};
pub use cli::commands::Cli;
pub use output::console::ConsoleFormatter;

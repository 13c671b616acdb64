//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure adapters must implement.

pub mod aider_connector;
pub mod command_registry;
pub mod conversation_logger;
pub mod language_model;
pub mod preferences;

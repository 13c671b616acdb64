//! Agent descriptors and the parsers for language-model replies that drive
//! agent dispatch (delegation and command selection).

pub mod command;
pub mod descriptor;
pub mod selection;

pub use command::{ParsedCommand, parse_command_response};
pub use descriptor::AgentDescriptor;
pub use selection::{DEFAULT_DELEGATE, agent_manifest, parse_agent_selection};

//! Command registry port
//!
//! The IDE commands the command agent may suggest.

use chatwire_domain::CommandRef;

pub trait CommandRegistry: Send + Sync {
    /// All known commands, in registration order.
    fn commands(&self) -> Vec<CommandRef>;

    fn get_command(&self, id: &str) -> Option<CommandRef>;

    /// Register a command created at runtime (custom handlers).
    fn register_command(&self, command: CommandRef);
}

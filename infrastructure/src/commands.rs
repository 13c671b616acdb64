//! In-memory command registry seeded from the config file

use crate::config::FileCommandConfig;
use chatwire_application::ports::command_registry::CommandRegistry;
use chatwire_domain::CommandRef;
use std::sync::RwLock;
use tracing::debug;

/// Commands in registration order. Registering an existing id replaces it.
#[derive(Debug, Default)]
pub struct StaticCommandRegistry {
    commands: RwLock<Vec<CommandRef>>,
}

impl StaticCommandRegistry {
    pub fn new(commands: Vec<CommandRef>) -> Self {
        Self {
            commands: RwLock::new(commands),
        }
    }

    pub fn from_config(commands: &[FileCommandConfig]) -> Self {
        Self::new(commands.iter().map(FileCommandConfig::to_command).collect())
    }
}

impl CommandRegistry for StaticCommandRegistry {
    fn commands(&self) -> Vec<CommandRef> {
        self.commands
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn get_command(&self, id: &str) -> Option<CommandRef> {
        self.commands
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|c| c.id == id)
            .cloned()
    }

    fn register_command(&self, command: CommandRef) {
        let mut commands = self.commands.write().unwrap_or_else(|e| e.into_inner());
        debug!(id = %command.id, "Registering command");
        match commands.iter_mut().find(|c| c.id == command.id) {
            Some(existing) => *existing = command,
            None => commands.push(command),
        }
    }
}

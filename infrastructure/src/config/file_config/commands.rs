//! Command list from TOML (`[[commands]]` entries)

use chatwire_domain::CommandRef;
use serde::{Deserialize, Serialize};

/// One IDE command the command agent may suggest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCommandConfig {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
}

impl FileCommandConfig {
    pub fn to_command(&self) -> CommandRef {
        let command = CommandRef::new(&self.id);
        match &self.label {
            Some(label) => command.with_label(label),
            None => command,
        }
    }
}

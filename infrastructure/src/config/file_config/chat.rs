//! Chat configuration from TOML (`[chat]` section)

use chatwire_application::DELEGATING_AGENT_ID;
use serde::{Deserialize, Serialize};

/// Raw chat configuration from TOML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileChatConfig {
    /// Agent answering requests that mention none
    pub default_agent: Option<String>,
    /// Agent used when the default is unset or unknown
    pub fallback_agent: Option<String>,
}

impl Default for FileChatConfig {
    fn default() -> Self {
        Self {
            default_agent: None,
            fallback_agent: Some(DELEGATING_AGENT_ID.to_string()),
        }
    }
}

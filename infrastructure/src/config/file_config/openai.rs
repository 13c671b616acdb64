//! OpenAI-compatible model configuration from TOML (`[openai]` section)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileOpenAiConfig {
    /// Environment variable name for the API key (default: "OPENAI_API_KEY").
    pub api_key_env: String,
    /// Direct API key (not recommended; use the env var instead).
    pub api_key: Option<String>,
    /// Base URL, up to and including the version segment.
    pub base_url: String,
    /// Model used for every purpose without an override.
    pub model: String,
    /// Per-purpose overrides: `chat`, `command`, `agent-selection`.
    pub purposes: HashMap<String, String>,
    /// Max tokens per response.
    pub max_tokens: u32,
}

impl Default for FileOpenAiConfig {
    fn default() -> Self {
        Self {
            api_key_env: "OPENAI_API_KEY".to_string(),
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
            purposes: HashMap::new(),
            max_tokens: 4096,
        }
    }
}

impl FileOpenAiConfig {
    /// Model name for `purpose`.
    pub fn model_for(&self, purpose: &str) -> &str {
        self.purposes
            .get(purpose)
            .map(String::as_str)
            .unwrap_or(&self.model)
    }

    /// API key from the config file, else from the environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .filter(|k| !k.is_empty())
    }
}

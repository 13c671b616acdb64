//! Logging configuration from TOML (`[logging]` section)

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    /// JSONL conversation transcript
    pub conversation_log: Option<String>,
    /// Diagnostic log file; stderr when unset
    pub log_file: Option<String>,
}

//! Conversation log: one JSON object per line.

use chatwire_application::ports::conversation_logger::{ConversationEvent, ConversationLogger};
use serde_json::{Map, Value};
use std::fs::{File, OpenOptions};
use std::io::{self, LineWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// Appends conversation events to a `.jsonl` file. Earlier runs are kept.
pub struct JsonlConversationLogger {
    path: PathBuf,
    file: Mutex<LineWriter<File>>,
}

impl JsonlConversationLogger {
    /// Open `path` for appending, creating it and its directory as needed.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(LineWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// The payload's fields plus `type` and `timestamp`. A payload that is not
/// an object goes under `data`.
fn record(event: ConversationEvent) -> Value {
    let mut fields = match event.payload {
        Value::Object(fields) => fields,
        other => Map::from_iter([("data".to_string(), other)]),
    };
    fields.insert("type".into(), Value::from(event.event_type));
    fields.insert(
        "timestamp".into(),
        Value::from(
            event
                .timestamp
                .to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        ),
    );
    Value::Object(fields)
}

impl ConversationLogger for JsonlConversationLogger {
    fn log(&self, event: ConversationEvent) {
        let line = record(event).to_string();
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = writeln!(file, "{line}") {
            warn!(path = %self.path.display(), error = %e, "Conversation log write failed");
        }
    }
}

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chat_provider::Message;

use crate::error::HistoryStoreError;

pub const DEFAULT_HISTORY_FILE: &str = "memory.json";
pub const DEFAULT_HISTORY_LIMIT: usize = 24;

/// Durable history: a single JSON array of `{role, content}` records.
///
/// The whole file is read on load and rewritten on save. There is no locking;
/// two processes sharing a file race and the last writer wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryFile {
    path: PathBuf,
    limit: usize,
}

impl HistoryFile {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, limit: usize) -> Self {
        Self {
            path: path.into(),
            limit,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Reads every persisted message. A missing file is an empty history.
    pub fn load(&self) -> Result<Vec<Message>, HistoryStoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(HistoryStoreError::io(
                    "reading history file",
                    &self.path,
                    source,
                ))
            }
        };

        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&raw).map_err(|source| HistoryStoreError::json_parse(&self.path, source))
    }

    /// Overwrites the file with the most recent `limit` messages.
    pub fn save(&self, messages: &[Message]) -> Result<(), HistoryStoreError> {
        let kept = tail(messages, self.limit);
        let encoded = serde_json::to_vec_pretty(kept)
            .map_err(|source| HistoryStoreError::json_serialize(&self.path, source))?;

        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| {
                HistoryStoreError::io("creating history directory", parent, source)
            })?;
        }

        fs::write(&self.path, encoded)
            .map_err(|source| HistoryStoreError::io("writing history file", &self.path, source))?;
        tracing::debug!(path = %self.path.display(), count = kept.len(), "saved history");
        Ok(())
    }
}

pub(crate) fn tail(messages: &[Message], limit: usize) -> &[Message] {
    &messages[messages.len().saturating_sub(limit)..]
}

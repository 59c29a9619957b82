//! Verification history: the last few verified claims and their results,
//! newest first, one entry per claim.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("history file {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryItem {
    /// Milliseconds since the epoch when the item was recorded.
    pub id: i64,
    /// RFC 3339 timestamp.
    pub timestamp: String,
    pub claim: String,
    /// Backend result, stored as received.
    pub result: Value,
}

impl HistoryItem {
    /// The verdict string inside the stored result, if there is one.
    ///
    /// Results carry either `verification_verdict` (an object or a list of
    /// them) or a top-level `verdict`.
    pub fn verdict(&self) -> Option<&str> {
        let verdict_obj = match self.result.get("verification_verdict") {
            Some(Value::Array(items)) => items.first(),
            Some(obj) => Some(obj),
            None => Some(&self.result),
        };
        verdict_obj?.get("verdict")?.as_str()
    }
}

#[derive(Debug, Default)]
pub struct HistoryStore {
    items: Vec<HistoryItem>,
    limit: usize,
    path: Option<PathBuf>,
}

impl HistoryStore {
    pub fn in_memory(limit: usize) -> Self {
        Self {
            items: Vec::new(),
            limit,
            path: None,
        }
    }

    /// Open a store persisted at `path`. A missing file starts empty.
    pub fn open(path: &Path, limit: usize) -> Result<Self, HistoryError> {
        let items = match std::fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str(&raw).map_err(|source| HistoryError::Json {
                path: path.to_path_buf(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(source) => {
                return Err(HistoryError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let mut store = Self {
            items,
            limit,
            path: Some(path.to_path_buf()),
        };
        store.items.truncate(limit);
        Ok(store)
    }

    pub fn items(&self) -> &[HistoryItem] {
        &self.items
    }

    pub fn find(&self, claim: &str) -> Option<&HistoryItem> {
        self.items.iter().find(|h| h.claim == claim)
    }

    /// Put a result at the front, replacing any older entry for the claim.
    pub fn record(&mut self, claim: &str, result: Value) -> Result<(), HistoryError> {
        let now = Utc::now();
        let item = HistoryItem {
            id: now.timestamp_millis(),
            timestamp: now.to_rfc3339(),
            claim: claim.to_string(),
            result,
        };
        self.items.retain(|h| h.claim != claim);
        self.items.insert(0, item);
        self.items.truncate(self.limit);
        self.save()
    }

    pub fn clear(&mut self) -> Result<(), HistoryError> {
        self.items.clear();
        self.save()
    }

    fn save(&self) -> Result<(), HistoryError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let raw = serde_json::to_string_pretty(&self.items).map_err(|source| HistoryError::Json {
            path: path.clone(),
            source,
        })?;
        std::fs::write(path, raw).map_err(|source| HistoryError::Io {
            path: path.clone(),
            source,
        })
    }
}

// ── Cursor persistence ──

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path as FsPath, PathBuf};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use super::Cursor;
use crate::error::{CoreError, Result};
use crate::path::Path;

/// Identifies one persisted cursor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CursorKey {
    pub connector_id: String,
    pub event_path: Path,
}

impl CursorKey {
    pub fn new(connector_id: impl Into<String>, event_path: Path) -> Self {
        Self {
            connector_id: connector_id.into(),
            event_path,
        }
    }
}

impl fmt::Display for CursorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.connector_id, self.event_path)
    }
}

#[async_trait]
pub trait CursorStore: Send + Sync {
    async fn load(&self, key: &CursorKey) -> Result<Option<Cursor>>;

    async fn save(&self, key: &CursorKey, cursor: Cursor) -> Result<()>;

    /// Returns `true` if a cursor was removed.
    async fn remove(&self, key: &CursorKey) -> Result<bool>;

    /// Every stored cursor, ordered by key.
    async fn list(&self) -> Result<Vec<(CursorKey, Cursor)>>;
}

// ── In-memory ───────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemoryCursorStore {
    cursors: DashMap<CursorKey, Cursor>,
}

impl MemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CursorStore for MemoryCursorStore {
    async fn load(&self, key: &CursorKey) -> Result<Option<Cursor>> {
        Ok(self.cursors.get(key).map(|c| *c))
    }

    async fn save(&self, key: &CursorKey, cursor: Cursor) -> Result<()> {
        self.cursors.insert(key.clone(), cursor);
        Ok(())
    }

    async fn remove(&self, key: &CursorKey) -> Result<bool> {
        Ok(self.cursors.remove(key).is_some())
    }

    async fn list(&self) -> Result<Vec<(CursorKey, Cursor)>> {
        let mut all: Vec<_> = self
            .cursors
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(all)
    }
}

// ── JSON file ───────────────────────────────────────────────────────

/// connector id -> event path -> cursor
type CursorFile = BTreeMap<String, BTreeMap<String, Cursor>>;

/// Cursors kept in one JSON file, rewritten atomically on every change.
#[derive(Debug)]
pub struct FileCursorStore {
    path: PathBuf,
    cursors: Mutex<CursorFile>,
}

impl FileCursorStore {
    /// Open (or lazily create) the store at `path`.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let cursors = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => CursorFile::new(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| CoreError::Storage {
                message: format!("{}: {e}", path.display()),
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => CursorFile::new(),
            Err(e) => return Err(storage_error(&path, &e)),
        };
        debug!(path = %path.display(), connectors = cursors.len(), "opened cursor store");
        Ok(Self {
            path,
            cursors: Mutex::new(cursors),
        })
    }

    pub fn path(&self) -> &FsPath {
        &self.path
    }

    async fn persist(&self, cursors: &CursorFile) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(cursors).map_err(|e| CoreError::Storage {
            message: e.to_string(),
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_error(parent, &e))?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| storage_error(&tmp, &e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| storage_error(&self.path, &e))
    }
}

fn storage_error(path: &FsPath, err: &std::io::Error) -> CoreError {
    CoreError::Storage {
        message: format!("{}: {err}", path.display()),
    }
}

#[async_trait]
impl CursorStore for FileCursorStore {
    async fn load(&self, key: &CursorKey) -> Result<Option<Cursor>> {
        let cursors = self.cursors.lock().await;
        Ok(cursors
            .get(&key.connector_id)
            .and_then(|events| events.get(&key.event_path.to_string()))
            .copied())
    }

    // Both mutations stage a copy and only replace the in-memory map once
    // the file is written, so memory never runs ahead of disk.
    async fn save(&self, key: &CursorKey, cursor: Cursor) -> Result<()> {
        let mut cursors = self.cursors.lock().await;
        let mut staged = cursors.clone();
        staged
            .entry(key.connector_id.clone())
            .or_default()
            .insert(key.event_path.to_string(), cursor);
        self.persist(&staged).await?;
        *cursors = staged;
        Ok(())
    }

    async fn remove(&self, key: &CursorKey) -> Result<bool> {
        let mut cursors = self.cursors.lock().await;
        let mut staged = cursors.clone();
        let Some(events) = staged.get_mut(&key.connector_id) else {
            return Ok(false);
        };
        if events.remove(&key.event_path.to_string()).is_none() {
            return Ok(false);
        }
        if events.is_empty() {
            staged.remove(&key.connector_id);
        }
        self.persist(&staged).await?;
        *cursors = staged;
        Ok(true)
    }

    async fn list(&self) -> Result<Vec<(CursorKey, Cursor)>> {
        let cursors = self.cursors.lock().await;
        Ok(cursors
            .iter()
            .flat_map(|(connector, events)| {
                events.iter().map(move |(event, cursor)| {
                    (CursorKey::new(connector.clone(), Path::parse(event)), *cursor)
                })
            })
            .collect())
    }
}

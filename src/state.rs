use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::StateError;

pub const DATE_FMT: &str = "%Y-%m-%d";

/// Dates already imported, keyed `YYYY-MM-DD`. Only ever grows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncState {
    entries: BTreeMap<String, bool>,
}

impl SyncState {
    pub fn is_synced(&self, date: NaiveDate) -> bool {
        self.entries.get(&key(date)).copied().unwrap_or(false)
    }

    pub fn mark(&mut self, date: NaiveDate) {
        self.entries.insert(key(date), true);
    }

    pub fn synced_count(&self) -> usize {
        self.entries.values().filter(|v| **v).count()
    }
}

pub fn key(date: NaiveDate) -> String {
    date.format(DATE_FMT).to_string()
}

/// Whole-state load/save. There are no partial updates.
pub trait StateStore {
    fn load(&self) -> Result<SyncState, StateError>;
    fn save(&self, state: &SyncState) -> Result<(), StateError>;
}

impl<T: StateStore> StateStore for &T {
    fn load(&self) -> Result<SyncState, StateError> {
        (**self).load()
    }

    fn save(&self, state: &SyncState) -> Result<(), StateError> {
        (**self).save(state)
    }
}

/// Pretty-printed JSON object on disk.
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where an unreadable history is moved before it is replaced.
    pub fn backup_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".bak");
        PathBuf::from(name)
    }

    fn io_err(&self, source: std::io::Error) -> StateError {
        StateError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

impl StateStore for JsonStateStore {
    /// A missing file is an empty state. An unreadable one is moved aside
    /// to `<path>.bak` and also reads as empty.
    fn load(&self) -> Result<SyncState, StateError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(SyncState::default()),
            Err(e) => return Err(self.io_err(e)),
        };
        match serde_json::from_str(&raw) {
            Ok(state) => Ok(state),
            Err(e) => {
                let backup = self.backup_path();
                warn!(
                    "unreadable sync history {}: {}; moved to {}",
                    self.path.display(),
                    e,
                    backup.display()
                );
                fs::rename(&self.path, &backup).map_err(|e| self.io_err(e))?;
                Ok(SyncState::default())
            }
        }
    }

    fn save(&self, state: &SyncState) -> Result<(), StateError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| self.io_err(e))?;
        }
        let json = serde_json::to_string_pretty(state)?;
        fs::write(&self.path, json).map_err(|e| self.io_err(e))
    }
}

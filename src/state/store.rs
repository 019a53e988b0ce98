//! Key-value state shared with the rest of the system.
//!
//! The coordinator publishes its metrics and last run summary here after
//! every run.

use crate::{elog_debug, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Key under which coordination metrics are published.
pub const METRICS_KEY: &str = "coordination:metrics";
/// Key under which the most recent run summary is published.
pub const LAST_RESULT_KEY: &str = "coordination:last_result";

pub trait StateStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>>;
    fn set(&self, key: &str, value: Value) -> Result<()>;
    /// Remove a key. Returns whether it was present.
    fn clear(&self, key: &str) -> Result<bool>;
    fn keys(&self) -> Result<Vec<String>>;
}

type Entries = BTreeMap<String, Value>;

fn read(lock: &RwLock<Entries>) -> RwLockReadGuard<'_, Entries> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write(lock: &RwLock<Entries>) -> RwLockWriteGuard<'_, Entries> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    entries: RwLock<Entries>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(read(&self.entries).get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        write(&self.entries).insert(key.to_string(), value);
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<bool> {
        Ok(write(&self.entries).remove(key).is_some())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(read(&self.entries).keys().cloned().collect())
    }
}

/// Store persisted as a single JSON object on disk.
///
/// Entries are cached in memory; every mutation rewrites the file.
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
    entries: RwLock<Entries>,
}

impl FileStateStore {
    /// Open a store at `path`, loading existing entries if the file exists.
    pub fn open(path: &Path) -> Result<Self> {
        let entries = if path.exists() {
            let raw = fs::read_to_string(path)?;
            if raw.trim().is_empty() {
                Entries::new()
            } else {
                serde_json::from_str(&raw)?
            }
        } else {
            Entries::new()
        };
        elog_debug!(
            "FileStateStore::open path={} entries={}",
            path.display(),
            entries.len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &Entries) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir)?;
            }
        }
        fs::write(&self.path, serde_json::to_string_pretty(entries)?)?;
        Ok(())
    }
}

impl StateStore for FileStateStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(read(&self.entries).get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut entries = write(&self.entries);
        entries.insert(key.to_string(), value);
        self.persist(&entries)
    }

    fn clear(&self, key: &str) -> Result<bool> {
        let mut entries = write(&self.entries);
        let removed = entries.remove(key).is_some();
        if removed {
            self.persist(&entries)?;
        }
        Ok(removed)
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(read(&self.entries).keys().cloned().collect())
    }
}

//! Session storage persisted to a JSON file
//!
//! Keeps the session across process restarts, which is what a desktop or
//! terminal shell needs to restore its navigation stack on start.

use crate::core::error::{NavResult, StorageError};
use crate::storage::SessionStorage;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Session storage writing every change through to a JSON file
#[derive(Debug)]
pub struct FileSessionStorage {
    path: PathBuf,
    values: RwLock<BTreeMap<String, String>>,
}

impl FileSessionStorage {
    /// Open the storage at `path`, loading it when the file exists
    pub fn open(path: impl AsRef<Path>) -> NavResult<Self> {
        let path = path.as_ref().to_path_buf();
        let values = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(backend)?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content).map_err(backend)?
            }
        } else {
            BTreeMap::new()
        };
        tracing::debug!(path = %path.display(), keys = values.len(), "session storage opened");
        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, values: &BTreeMap<String, String>) -> NavResult<()> {
        let content = serde_json::to_string_pretty(values).map_err(backend)?;
        std::fs::write(&self.path, content).map_err(backend)?;
        Ok(())
    }
}

fn backend(err: impl std::fmt::Display) -> StorageError {
    StorageError::Backend {
        message: err.to_string(),
    }
}

impl SessionStorage for FileSessionStorage {
    fn get(&self, key: &str) -> NavResult<Option<String>> {
        Ok(self.values.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> NavResult<()> {
        let mut values = self.values.write();
        values.insert(key.to_string(), value.to_string());
        self.flush(&values)
    }

    fn remove(&self, key: &str) -> NavResult<()> {
        let mut values = self.values.write();
        if values.remove(key).is_some() {
            self.flush(&values)?;
        }
        Ok(())
    }

    fn clear(&self) -> NavResult<()> {
        let mut values = self.values.write();
        values.clear();
        self.flush(&values)
    }
}

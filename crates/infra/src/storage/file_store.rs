//! File-backed key-value store.
//!
//! The session lives in one JSON document. Every batch rewrites the whole
//! document into a temp file in the same directory and renames it over the
//! original, so readers see either the old or the new document.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};
use sidepanel_common::auth::{KeyValueStore, StorageError};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// [`KeyValueStore`] persisted as a JSON document on disk
pub struct FileStore {
    path: PathBuf,
    // serializes read-modify-write cycles within the process
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Map<String, Value>, StorageError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        if raw.is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_slice::<Value>(&raw)? {
            Value::Object(map) => Ok(map),
            _ => Err(StorageError::Serialization(format!(
                "{} does not hold a JSON object",
                self.path.display()
            ))),
        }
    }

    async fn save(&self, map: Map<String, Value>) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec_pretty(&Value::Object(map))?;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || write_atomically(&path, &bytes))
            .await
            .map_err(|e| StorageError::Io(format!("Session write task failed: {e}")))?
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| StorageError::Io(e.error.to_string()))?;
    Ok(())
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get_many(&self, keys: &[&str]) -> Result<HashMap<String, Value>, StorageError> {
        let _guard = self.lock.lock().await;
        let mut map = self.load().await?;
        Ok(keys
            .iter()
            .filter_map(|key| map.remove(*key).map(|value| ((*key).to_string(), value)))
            .collect())
    }

    async fn set_many(&self, entries: Vec<(String, Value)>) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let mut map = match self.load().await {
            Ok(map) => map,
            Err(StorageError::Serialization(e)) => {
                warn!(path = %self.path.display(), error = %e, "Replacing unreadable session file");
                Map::new()
            }
            Err(e) => return Err(e),
        };
        let count = entries.len();
        map.extend(entries);
        self.save(map).await?;
        debug!(path = %self.path.display(), count, "Wrote session entries");
        Ok(())
    }

    async fn remove_many(&self, keys: &[&str]) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let mut map = self.load().await?;
        let before = map.len();
        for key in keys {
            map.remove(*key);
        }
        if map.len() == before {
            return Ok(());
        }
        self.save(map).await
    }
}

//! Key-value storage backends for the session.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use thiserror::Error;

use super::traits::KeyValueStore;
use crate::error::{ErrorClassification, ErrorSeverity};

/// Storage backend failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Storage I/O error: {0}")]
    Io(String),

    #[error("Stored value could not be (de)serialized: {0}")]
    Serialization(String),

    #[error("Keychain error: {0}")]
    Keychain(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl ErrorClassification for StorageError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Keychain(_))
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Serialization(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }
}

/// In-process store; contents vanish with the process
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get_many(&self, keys: &[&str]) -> Result<HashMap<String, Value>, StorageError> {
        let entries = self.entries.read();
        Ok(keys
            .iter()
            .filter_map(|key| entries.get(*key).map(|value| ((*key).to_string(), value.clone())))
            .collect())
    }

    async fn set_many(&self, batch: Vec<(String, Value)>) -> Result<(), StorageError> {
        self.entries.write().extend(batch);
        Ok(())
    }

    async fn remove_many(&self, keys: &[&str]) -> Result<(), StorageError> {
        let mut entries = self.entries.write();
        for key in keys {
            entries.remove(*key);
        }
        Ok(())
    }
}

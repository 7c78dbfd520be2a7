//! Platform keychain backend for the token store.
//!
//! The whole auth namespace lives in a single keychain entry holding a JSON
//! object, so a batch write is one `set_password` call and is applied as a
//! unit (macOS Keychain, Windows Credential Manager, Linux kernel keyring).

use std::collections::HashMap;

use async_trait::async_trait;
use keyring::Entry;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::debug;

use super::storage::StorageError;
use super::traits::KeyValueStore;

/// Account name of the single entry under the configured service
pub const KEYCHAIN_ACCOUNT: &str = "auth-session";

/// [`KeyValueStore`] backed by one platform keychain entry
pub struct KeychainStore {
    service_name: String,
    account: String,
    // One entry for the store's lifetime; the lock also serializes
    // read-modify-write cycles on it
    entry: Mutex<Option<Entry>>,
}

impl KeychainStore {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self::with_account(service_name, KEYCHAIN_ACCOUNT)
    }

    pub fn with_account(service_name: impl Into<String>, account: impl Into<String>) -> Self {
        Self { service_name: service_name.into(), account: account.into(), entry: Mutex::new(None) }
    }

    fn with_entry<T>(
        &self,
        f: impl FnOnce(&Entry) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let mut slot = self.entry.lock();
        if slot.is_none() {
            let entry = Entry::new(&self.service_name, &self.account).map_err(|e| {
                StorageError::Keychain(format!("Failed to create keychain entry: {e}"))
            })?;
            *slot = Some(entry);
        }
        let Some(entry) = slot.as_ref() else {
            return Err(StorageError::Keychain("Keychain entry unavailable".to_string()));
        };
        f(entry)
    }

    fn load(&self, entry: &Entry) -> Result<Map<String, Value>, StorageError> {
        match entry.get_password() {
            Ok(raw) => match serde_json::from_str::<Value>(&raw)? {
                Value::Object(map) => Ok(map),
                _ => Err(StorageError::Serialization(
                    "Keychain entry is not a JSON object".to_string(),
                )),
            },
            Err(keyring::Error::NoEntry) => Ok(Map::new()),
            Err(e) => Err(StorageError::Keychain(format!(
                "Failed to read {} from keychain: {e}",
                self.account
            ))),
        }
    }

    fn save(&self, entry: &Entry, map: Map<String, Value>) -> Result<(), StorageError> {
        if map.is_empty() {
            return match entry.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
                Err(e) => Err(StorageError::Keychain(format!(
                    "Failed to delete {} from keychain: {e}",
                    self.account
                ))),
            };
        }

        let raw = serde_json::to_string(&Value::Object(map))?;
        entry.set_password(&raw).map_err(|e| {
            StorageError::Keychain(format!("Failed to write {} to keychain: {e}", self.account))
        })
    }
}

#[async_trait]
impl KeyValueStore for KeychainStore {
    async fn get_many(&self, keys: &[&str]) -> Result<HashMap<String, Value>, StorageError> {
        let mut map = self.with_entry(|entry| self.load(entry))?;
        Ok(keys
            .iter()
            .filter_map(|key| map.remove(*key).map(|value| ((*key).to_string(), value)))
            .collect())
    }

    async fn set_many(&self, entries: Vec<(String, Value)>) -> Result<(), StorageError> {
        let count = entries.len();
        self.with_entry(|entry| {
            let mut map = self.load(entry)?;
            map.extend(entries);
            self.save(entry, map)
        })?;
        debug!(service = %self.service_name, count, "Wrote auth entries to keychain");
        Ok(())
    }

    async fn remove_many(&self, keys: &[&str]) -> Result<(), StorageError> {
        let removed = self.with_entry(|entry| {
            let mut map = self.load(entry)?;
            let before = map.len();
            for key in keys {
                map.remove(*key);
            }
            if map.len() == before {
                return Ok(false);
            }
            self.save(entry, map).map(|()| true)
        })?;
        if !removed {
            return Ok(());
        }
        debug!(service = %self.service_name, count = keys.len(), "Removed auth entries from keychain");
        Ok(())
    }
}

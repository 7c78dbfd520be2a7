//! Storage backends for the token store
//!
//! `MemoryStore` and `KeychainStore` live in `sidepanel-common`; this module
//! adds the on-disk backend and picks one from configuration.

pub mod file_store;

use std::path::PathBuf;
use std::sync::Arc;

pub use file_store::FileStore;
use sidepanel_common::auth::keychain::KeychainStore;
use sidepanel_common::auth::{KeyValueStore, MemoryStore};
use sidepanel_domain::constants::DEFAULT_STORAGE_FILE;
use sidepanel_domain::{StorageBackend, StorageConfig};

/// Build the configured backend
#[must_use]
pub fn open_store(config: &StorageConfig) -> Arc<dyn KeyValueStore> {
    match config.backend {
        StorageBackend::Memory => {
            tracing::info!("Using in-memory session storage");
            Arc::new(MemoryStore::new())
        }
        StorageBackend::File => {
            let path = config.path.as_ref().map_or_else(|| PathBuf::from(DEFAULT_STORAGE_FILE), PathBuf::from);
            tracing::info!(path = %path.display(), "Using file session storage");
            Arc::new(FileStore::new(path))
        }
        StorageBackend::Keychain => {
            tracing::info!(service = %config.keychain_service, "Using keychain session storage");
            Arc::new(KeychainStore::new(config.keychain_service.clone()))
        }
    }
}

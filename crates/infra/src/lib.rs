//! # Sidepanel Infrastructure
//!
//! Process-level implementations of the auth core's seams.
//!
//! This crate contains:
//! - Configuration loading (environment, TOML, JSON)
//! - The on-disk session store and backend selection
//! - The system browser opener
//! - The loopback callback relay
//!
//! ## Architecture
//! - Implements traits defined in `sidepanel-common::auth`
//! - Depends on `sidepanel-domain` for configuration and errors
//! - Contains all "impure" code (I/O, sockets, browser launch)

pub mod browser;
pub mod callback;
pub mod config;
pub mod storage;

// Re-export commonly used items
pub use browser::{PrintUrlOpener, SystemBrowserOpener};
pub use callback::CallbackServer;
pub use storage::{open_store, FileStore};

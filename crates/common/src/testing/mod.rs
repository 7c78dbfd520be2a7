//! Testing utilities and helpers
//!
//! - **[`mocks`]**: Mock implementations of the auth seams
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use sidepanel_common::auth::{AuthService, AuthSettings, MemoryStore, TokenStore};
//! use sidepanel_common::testing::{MockOAuthClient, MockWindowOpener};
//!
//! let store = Arc::new(TokenStore::new(MemoryStore::new(), Duration::from_secs(300)));
//! let service = AuthService::new(
//!     Arc::new(MockOAuthClient::new()),
//!     store,
//!     Arc::new(MockWindowOpener::new()),
//!     AuthSettings::default(),
//! );
//! # let _ = service;
//! ```

pub mod mocks;

pub use mocks::{FailingStore, MockOAuthClient, MockWindowOpener};

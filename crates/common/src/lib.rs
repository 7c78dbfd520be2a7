//! Modular common utilities shared across Sidepanel crates.
//!
//! The authentication core (PKCE, token store, token service, orchestrator,
//! observer) lives in [`auth`]. Everything here is free of process-level
//! concerns: configuration loading, browser launching and the loopback
//! callback server belong to `sidepanel-infra`.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: error classification
//! - `runtime`: async auth core (default)
//! - `platform`: OS keychain storage backend
//! - `observability`: tracing (pulled in by `runtime`)
//! - `test-utils`: mocks for downstream tests

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod error;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod auth;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(all(feature = "runtime", any(feature = "test-utils", test)))]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "runtime")]
pub use auth::{
    AuthError, AuthErrorKind, AuthObserver, AuthService, AuthStatus, AuthView, CallbackMessage,
    KeyValueStore, MemoryStore, OAuthClient, OAuthConfig, StorageError, TokenSet, TokenStore,
    UserInfo, WindowOpener,
};
#[cfg(feature = "foundation")]
pub use error::{ErrorClassification, ErrorSeverity};

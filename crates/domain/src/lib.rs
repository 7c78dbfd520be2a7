//! # Sidepanel Domain
//!
//! Application-level types for the Sidepanel auth host.
//!
//! This crate contains:
//! - Configuration structures (provider, refresh policy, PKCE, session,
//!   storage, logging)
//! - Application error type and Result definition
//! - Constants (storage keys, defaults)
//!
//! ## Architecture
//! - No dependencies on other Sidepanel crates
//! - Only external dependencies allowed

pub mod config;
pub mod constants;
pub mod errors;

// Re-export commonly used items
pub use config::*;
pub use errors::*;

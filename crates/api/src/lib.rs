//! # Sidepanel App
//!
//! Host layer - commands and main entry point.
//!
//! This crate contains:
//! - Auth commands (UI → auth core bridge)
//! - Application context (dependency injection)
//! - Logging setup
//!
//! ## Architecture
//! - Depends on `common`, `domain`, and `infra`
//! - Wires the auth core to the configured storage and browser
//! - Provides commands for the CLI front end

pub mod commands;
pub mod context;
pub mod utils;

// Re-export for convenience
pub use commands::*;
pub use context::*;

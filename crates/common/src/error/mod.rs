//! Error classification shared by every Sidepanel error type.
//!
//! Individual modules own their concrete error enums (see
//! [`crate::auth::AuthError`] and [`crate::auth::StorageError`]); this module
//! only defines the vocabulary used to reason about them uniformly:
//!
//! - **[`ErrorClassification`]**: retryability, severity and retry hints
//! - **[`ErrorSeverity`]**: the levels used for logging and alerting
//!
//! ## Usage
//!
//! ```rust
//! use std::time::Duration;
//!
//! use sidepanel_common::error::{ErrorClassification, ErrorSeverity};
//!
//! #[derive(Debug)]
//! struct Timeout;
//!
//! impl ErrorClassification for Timeout {
//!     fn is_retryable(&self) -> bool {
//!         true
//!     }
//!
//!     fn severity(&self) -> ErrorSeverity {
//!         ErrorSeverity::Warning
//!     }
//!
//!     fn retry_after(&self) -> Option<Duration> {
//!         Some(Duration::from_secs(1))
//!     }
//! }
//!
//! assert!(!Timeout.is_critical());
//! ```

use std::fmt;
use std::time::Duration;

/// Trait for classifying errors by retryability and severity.
///
/// Callers use this to decide whether to retry, how loudly to log, and
/// whether a failure should tear down the session.
pub trait ErrorClassification {
    /// Check if this error is retryable
    ///
    /// Retryable errors are transient issues that may succeed if attempted
    /// again, such as network timeouts or provider 5xx responses.
    fn is_retryable(&self) -> bool;

    /// Get the error severity level
    fn severity(&self) -> ErrorSeverity;

    /// Check if this is a critical error requiring immediate attention
    fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }

    /// Get the suggested retry delay if applicable
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention and action
    Error,
    /// Critical, immediate action required
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

//! Authentication error taxonomy.
//!
//! Every failure surfaced by the auth core is one of six kinds. The variant
//! payload is a diagnostic message meant for logs; presentation code should
//! call [`AuthError::user_message`] instead of displaying it.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::storage::StorageError;
use crate::error::{ErrorClassification, ErrorSeverity};

/// Authentication failure
///
/// `Clone` so that one in-flight refresh result can be handed to every
/// concurrent waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Transport or HTTP failure talking to the provider
    #[error("Network error: {0}")]
    Network(String),

    /// Token is past its (proactive) expiry
    #[error("Token expired")]
    TokenExpired,

    /// Operation attempted without usable token material
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Refresh exhausted its retries or was rejected
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    /// Protocol-level failure: state mismatch, missing PKCE material,
    /// provider-reported authorization error
    #[error("OAuth error: {0}")]
    OAuth(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// Discriminant of [`AuthError`], stable across message changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthErrorKind {
    NetworkError,
    TokenExpired,
    InvalidToken,
    RefreshFailed,
    OAuthError,
    UnknownError,
}

impl AuthErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NetworkError => "network_error",
            Self::TokenExpired => "token_expired",
            Self::InvalidToken => "invalid_token",
            Self::RefreshFailed => "refresh_failed",
            Self::OAuthError => "oauth_error",
            Self::UnknownError => "unknown_error",
        }
    }

    /// The single human-readable string shown for this kind
    #[must_use]
    pub const fn user_message(self) -> &'static str {
        match self {
            Self::NetworkError => {
                "We couldn't reach the sign-in service. Check your connection and try again."
            }
            Self::TokenExpired => "Your session has expired. Please sign in again.",
            Self::InvalidToken => "Your session is no longer valid. Please sign in again.",
            Self::RefreshFailed => "We couldn't renew your session. Please sign in again.",
            Self::OAuthError => "Sign-in could not be completed. Please try signing in again.",
            Self::UnknownError => "Something went wrong during sign-in. Please try again.",
        }
    }
}

impl fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AuthError {
    #[must_use]
    pub const fn kind(&self) -> AuthErrorKind {
        match self {
            Self::Network(_) => AuthErrorKind::NetworkError,
            Self::TokenExpired => AuthErrorKind::TokenExpired,
            Self::InvalidToken(_) => AuthErrorKind::InvalidToken,
            Self::RefreshFailed(_) => AuthErrorKind::RefreshFailed,
            Self::OAuth(_) => AuthErrorKind::OAuthError,
            Self::Unknown(_) => AuthErrorKind::UnknownError,
        }
    }

    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        self.kind().user_message()
    }
}

impl ErrorClassification for AuthError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::RefreshFailed(_))
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::TokenExpired => ErrorSeverity::Info,
            Self::Network(_) | Self::InvalidToken(_) | Self::RefreshFailed(_) => {
                ErrorSeverity::Warning
            }
            Self::OAuth(_) | Self::Unknown(_) => ErrorSeverity::Error,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        self.is_retryable().then(|| Duration::from_secs(1))
    }
}

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        Self::Unknown(err.to_string())
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

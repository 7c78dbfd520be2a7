//! Messages relayed into the process by the redirect landing pages.
//!
//! The callback page parses `code`/`state` (or `error`/`error_description`)
//! from its own URL and forwards them as a tagged message. Everything in a
//! message is untrusted: [`CallbackMessage::validate`] bounds the shape of
//! every field before the orchestrator touches the store with it.

use serde::{Deserialize, Serialize};
use url::Url;

use super::error::AuthError;

/// Longest accepted `code`/`state`
pub const MAX_PARAM_LENGTH: usize = 2048;
/// Longest accepted `error`/`error_description`
pub const MAX_ERROR_LENGTH: usize = 1024;

/// Message delivered by the callback or sign-out landing page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CallbackMessage {
    #[serde(rename = "OAUTH_SUCCESS")]
    Success { code: String, state: String },

    #[serde(rename = "OAUTH_ERROR")]
    Error {
        error: String,
        #[serde(rename = "errorDescription", default, skip_serializing_if = "Option::is_none")]
        error_description: Option<String>,
    },

    #[serde(rename = "SIGNOUT_SUCCESS")]
    SignoutSuccess,
}

impl CallbackMessage {
    /// Parse and validate a JSON message
    ///
    /// # Errors
    /// [`AuthError::OAuth`] if the payload is not a known message or fails
    /// validation
    pub fn from_json(raw: &str) -> Result<Self, AuthError> {
        let message: Self = serde_json::from_str(raw)
            .map_err(|e| AuthError::OAuth(format!("Malformed callback message: {e}")))?;
        message.validate()?;
        Ok(message)
    }

    /// Build a message from the query string of a redirect landing page.
    ///
    /// An `error` parameter wins over `code`/`state`, matching how providers
    /// report denied or failed authorizations.
    ///
    /// # Errors
    /// [`AuthError::OAuth`] if neither an error nor both `code` and `state`
    /// are present, or a field fails validation
    pub fn from_query_pairs<I, K, V>(pairs: I) -> Result<Self, AuthError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut code = None;
        let mut state = None;
        let mut error = None;
        let mut error_description = None;

        for (key, value) in pairs {
            let slot = match key.as_ref() {
                "code" => &mut code,
                "state" => &mut state,
                "error" => &mut error,
                "error_description" => &mut error_description,
                _ => continue,
            };
            // first occurrence wins
            if slot.is_none() {
                *slot = Some(value.into());
            }
        }

        let message = match (error, code, state) {
            (Some(error), _, _) => Self::Error { error, error_description },
            (None, Some(code), Some(state)) => Self::Success { code, state },
            _ => {
                return Err(AuthError::OAuth(
                    "Callback is missing code or state parameters".to_string(),
                ))
            }
        };
        message.validate()?;
        Ok(message)
    }

    /// Build a message from a full redirect URL
    ///
    /// # Errors
    /// [`AuthError::OAuth`] if the URL does not parse or carries no usable
    /// parameters
    pub fn from_redirect_url(redirect: &str) -> Result<Self, AuthError> {
        let url = Url::parse(redirect)
            .map_err(|e| AuthError::OAuth(format!("Malformed redirect URL: {e}")))?;
        Self::from_query_pairs(url.query_pairs().into_owned())
    }

    /// Check every field's shape
    ///
    /// # Errors
    /// [`AuthError::OAuth`] naming the offending field
    pub fn validate(&self) -> Result<(), AuthError> {
        match self {
            Self::Success { code, state } => {
                validate_callback_param("code", code)?;
                validate_callback_param("state", state)
            }
            Self::Error { error, error_description } => {
                validate_error_text("error", error)?;
                if error.is_empty() {
                    return Err(AuthError::OAuth("Callback error code is empty".to_string()));
                }
                error_description
                    .as_deref()
                    .map_or(Ok(()), |description| validate_error_text("error_description", description))
            }
            Self::SignoutSuccess => Ok(()),
        }
    }

    /// Stable label for logs
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Success { .. } => "OAUTH_SUCCESS",
            Self::Error { .. } => "OAUTH_ERROR",
            Self::SignoutSuccess => "SIGNOUT_SUCCESS",
        }
    }
}

/// Validate an authorization `code` or `state` value
///
/// Accepts 1..=2048 characters of unreserved URL characters plus `+/=`
/// (base64 alphabets).
///
/// # Errors
/// [`AuthError::OAuth`] naming `name`
pub fn validate_callback_param(name: &str, value: &str) -> Result<(), AuthError> {
    if value.is_empty() {
        return Err(AuthError::OAuth(format!("Callback {name} is empty")));
    }
    if value.len() > MAX_PARAM_LENGTH {
        return Err(AuthError::OAuth(format!("Callback {name} exceeds {MAX_PARAM_LENGTH} characters")));
    }
    if !value.bytes().all(|b| b.is_ascii_alphanumeric() || b"-._~+/=".contains(&b)) {
        return Err(AuthError::OAuth(format!("Callback {name} contains invalid characters")));
    }
    Ok(())
}

fn validate_error_text(name: &str, value: &str) -> Result<(), AuthError> {
    if value.chars().count() > MAX_ERROR_LENGTH {
        return Err(AuthError::OAuth(format!("Callback {name} exceeds {MAX_ERROR_LENGTH} characters")));
    }
    if value.chars().any(char::is_control) {
        return Err(AuthError::OAuth(format!("Callback {name} contains control characters")));
    }
    Ok(())
}

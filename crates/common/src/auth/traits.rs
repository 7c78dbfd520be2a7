//! Traits at the auth core's seams
//!
//! These traits enable dependency injection and testing by abstracting
//! external collaborators: the identity provider, the durable key-value
//! store and the browser-window opener.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::error::AuthError;
use super::pkce::PKCEChallenge;
use super::storage::StorageError;
use super::types::{TokenSet, UserInfo};

/// Trait for the provider protocol client
///
/// Implementations perform network exchanges only; persisting results is the
/// orchestrator's job.
#[async_trait]
pub trait OAuthClientTrait: Send + Sync {
    /// Build the authorization URL for one login attempt
    fn authorization_url(&self, challenge: &PKCEChallenge) -> String;

    /// Build the provider logout URL
    fn logout_url(&self) -> String;

    /// Exchange authorization code for tokens
    ///
    /// # Arguments
    /// * `code` - Authorization code from redirect callback
    /// * `code_verifier` - Verifier of the pending PKCE material
    ///
    /// # Errors
    /// [`AuthError::Network`] on transport failure, [`AuthError::OAuth`]
    /// carrying the provider's description on a non-success status
    async fn exchange_code(&self, code: &str, code_verifier: &str)
        -> Result<TokenSet, AuthError>;

    /// Refresh the access token of `tokens`
    ///
    /// # Returns
    /// New `TokenSet`; the previous refresh token is kept when the provider
    /// does not rotate it
    ///
    /// # Errors
    /// [`AuthError::InvalidToken`] without a refresh token,
    /// [`AuthError::RefreshFailed`] once retries are exhausted
    async fn refresh(&self, tokens: &TokenSet) -> Result<TokenSet, AuthError>;

    /// Fetch the OIDC profile for `access_token`
    ///
    /// # Errors
    /// [`AuthError::Network`] on any non-success response
    async fn fetch_user_info(&self, access_token: &str) -> Result<UserInfo, AuthError>;
}

/// Durable key-value storage collaborator
///
/// Every batch call is applied as one unit: after `set_many` returns, either
/// all entries are visible or none are.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the subset of `keys` that are present
    ///
    /// # Errors
    /// Returns error if the backend cannot be read
    async fn get_many(&self, keys: &[&str]) -> Result<HashMap<String, Value>, StorageError>;

    /// Write all `entries` as one batch
    ///
    /// # Errors
    /// Returns error if the backend cannot be written; nothing is applied
    async fn set_many(&self, entries: Vec<(String, Value)>) -> Result<(), StorageError>;

    /// Remove `keys` (absent keys are ignored)
    ///
    /// # Errors
    /// Returns error if the backend cannot be written
    async fn remove_many(&self, keys: &[&str]) -> Result<(), StorageError>;
}

#[async_trait]
impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    async fn get_many(&self, keys: &[&str]) -> Result<HashMap<String, Value>, StorageError> {
        (**self).get_many(keys).await
    }

    async fn set_many(&self, entries: Vec<(String, Value)>) -> Result<(), StorageError> {
        (**self).set_many(entries).await
    }

    async fn remove_many(&self, keys: &[&str]) -> Result<(), StorageError> {
        (**self).remove_many(keys).await
    }
}

/// Requested geometry for a new browsing surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSpec {
    pub width: u32,
    pub height: u32,
}

impl Default for WindowSpec {
    fn default() -> Self {
        Self { width: 500, height: 600 }
    }
}

/// Opens a URL in a new top-level browsing surface (popup, browser tab)
///
/// Fire-and-forget: implementations return once the surface is requested,
/// not when the user finishes interacting with it.
#[async_trait]
pub trait WindowOpener: Send + Sync {
    /// # Errors
    /// Returns a description if the surface could not be requested
    async fn open(&self, url: &str, spec: WindowSpec) -> Result<(), String>;
}

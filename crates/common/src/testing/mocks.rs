//! Mock implementations of the auth seams
//!
//! In-memory stand-ins for the provider client, the window opener and a
//! broken storage backend, with call recording for assertions.

// Allow missing error/panic docs for test mocks - they are designed to be simple
// and errors are clearly indicated by their return types
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::auth::store::compute_expiry;
use crate::auth::{
    AuthError, KeyValueStore, OAuthClientTrait, PKCEChallenge, StorageError, TokenSet, UserInfo,
    WindowOpener, WindowSpec,
};

/// Window opener that records every URL it is asked to open
///
/// # Examples
///
/// ```
/// # tokio_test::block_on(async {
/// use sidepanel_common::auth::{WindowOpener, WindowSpec};
/// use sidepanel_common::testing::MockWindowOpener;
///
/// let opener = MockWindowOpener::new();
/// opener.open("https://example.com", WindowSpec::default()).await.unwrap();
/// assert_eq!(opener.opened(), vec!["https://example.com".to_string()]);
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockWindowOpener {
    opened: Arc<Mutex<Vec<(String, WindowSpec)>>>,
    fail_next: Arc<Mutex<Option<String>>>,
}

impl MockWindowOpener {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `open` call fail with `reason`
    pub fn fail_next(&self, reason: &str) {
        *self.fail_next.lock() = Some(reason.to_string());
    }

    /// URLs successfully opened, oldest first
    #[must_use]
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().iter().map(|(url, _)| url.clone()).collect()
    }

    #[must_use]
    pub fn last_spec(&self) -> Option<WindowSpec> {
        self.opened.lock().last().map(|(_, spec)| *spec)
    }
}

#[async_trait]
impl WindowOpener for MockWindowOpener {
    async fn open(&self, url: &str, spec: WindowSpec) -> Result<(), String> {
        if let Some(reason) = self.fail_next.lock().take() {
            return Err(reason);
        }
        self.opened.lock().push((url.to_string(), spec));
        Ok(())
    }
}

/// Scripted provider client
///
/// Without scripting, exchanges issue a one-hour grant, refreshes issue a
/// new one-hour access token keeping the refresh token, and profile fetches
/// return a fixed user.
#[derive(Debug, Default)]
pub struct MockOAuthClient {
    exchange_response: Mutex<Option<Result<TokenSet, AuthError>>>,
    refresh_responses: Mutex<VecDeque<Result<TokenSet, AuthError>>>,
    user_response: Mutex<Option<Result<UserInfo, AuthError>>>,
    refresh_delay: Mutex<Option<Duration>>,
    refresh_lifetime: Mutex<Option<i64>>,
    exchanged_codes: Mutex<Vec<String>>,
    exchange_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    user_info_calls: AtomicUsize,
}

impl MockOAuthClient {
    pub const AUTHORIZE_URL: &'static str = "https://auth.example.test/oauth2/authorize";
    pub const LOGOUT_URL: &'static str = "https://auth.example.test/logout";

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Result returned by every subsequent `exchange_code`
    pub fn set_exchange_response(&self, response: Result<TokenSet, AuthError>) {
        *self.exchange_response.lock() = Some(response);
    }

    /// Queue a result for one `refresh` call
    pub fn push_refresh_response(&self, response: Result<TokenSet, AuthError>) {
        self.refresh_responses.lock().push_back(response);
    }

    /// Lifetime in seconds of unscripted refresh grants (default one hour)
    pub fn set_refresh_lifetime(&self, expires_in_secs: i64) {
        *self.refresh_lifetime.lock() = Some(expires_in_secs);
    }

    pub fn set_user_response(&self, response: Result<UserInfo, AuthError>) {
        *self.user_response.lock() = Some(response);
    }

    /// Delay every `refresh` call, to widen concurrency windows
    pub fn set_refresh_delay(&self, delay: Duration) {
        *self.refresh_delay.lock() = Some(delay);
    }

    #[must_use]
    pub fn exchanged_codes(&self) -> Vec<String> {
        self.exchanged_codes.lock().clone()
    }

    #[must_use]
    pub fn exchange_calls(&self) -> usize {
        self.exchange_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn user_info_calls(&self) -> usize {
        self.user_info_calls.load(Ordering::SeqCst)
    }

    /// Profile returned when no user response is scripted
    #[must_use]
    pub fn default_user() -> UserInfo {
        UserInfo {
            subject: "mock-user".to_string(),
            email: "mock@example.com".to_string(),
            email_verified: true,
            name: Some("Mock User".to_string()),
            given_name: None,
            family_name: None,
            picture: None,
            phone_number: None,
        }
    }
}

#[async_trait]
impl OAuthClientTrait for MockOAuthClient {
    fn authorization_url(&self, challenge: &PKCEChallenge) -> String {
        format!(
            "{}?code_challenge={}&state={}",
            Self::AUTHORIZE_URL,
            challenge.code_challenge,
            challenge.state
        )
    }

    fn logout_url(&self) -> String {
        Self::LOGOUT_URL.to_string()
    }

    async fn exchange_code(
        &self,
        code: &str,
        _code_verifier: &str,
    ) -> Result<TokenSet, AuthError> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        self.exchanged_codes.lock().push(code.to_string());
        self.exchange_response.lock().clone().unwrap_or_else(|| {
            Ok(TokenSet::new(
                format!("access-for-{code}"),
                Some("mock-refresh".to_string()),
                Some("mock-id".to_string()),
                compute_expiry(3600),
            ))
        })
    }

    async fn refresh(&self, tokens: &TokenSet) -> Result<TokenSet, AuthError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.refresh_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.refresh_responses.lock().pop_front();
        let lifetime = self.refresh_lifetime.lock().unwrap_or(3600);
        scripted.unwrap_or_else(|| {
            Ok(TokenSet::new(
                format!("{}-refreshed", tokens.access_token),
                tokens.refresh_token.clone(),
                tokens.id_token.clone(),
                compute_expiry(lifetime),
            ))
        })
    }

    async fn fetch_user_info(&self, _access_token: &str) -> Result<UserInfo, AuthError> {
        self.user_info_calls.fetch_add(1, Ordering::SeqCst);
        self.user_response.lock().clone().unwrap_or_else(|| Ok(Self::default_user()))
    }
}

/// Storage backend whose every operation fails
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingStore;

#[async_trait]
impl KeyValueStore for FailingStore {
    async fn get_many(&self, _keys: &[&str]) -> Result<HashMap<String, Value>, StorageError> {
        Err(StorageError::Backend("storage unavailable".to_string()))
    }

    async fn set_many(&self, _entries: Vec<(String, Value)>) -> Result<(), StorageError> {
        Err(StorageError::Backend("storage unavailable".to_string()))
    }

    async fn remove_many(&self, _keys: &[&str]) -> Result<(), StorageError> {
        Err(StorageError::Backend("storage unavailable".to_string()))
    }
}

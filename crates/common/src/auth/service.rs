//! Auth orchestrator
//!
//! Owns the login / callback / refresh / logout lifecycle on top of the
//! protocol client and the token store, plus the proactive refresh timer.
//!
//! ```text
//!                  login()                      handle_callback()
//! UNAUTHENTICATED ─────────► (pending PKCE) ───────────────────────► AUTHENTICATED
//!        ▲                                                              │
//!        └──────────── logout() / refresh failure + auto-logout ────────┘
//! ```
//!
//! Construct one [`AuthService`] at the process root and hand clones to
//! consumers; clones share the same state, timer and in-flight refresh.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::callback::{validate_callback_param, CallbackMessage};
use super::client::OAuthClient;
use super::error::AuthError;
use super::pkce::{validate_state, PKCEChallenge, DEFAULT_STATE_LENGTH, DEFAULT_VERIFIER_LENGTH};
use super::store::TokenStore;
use super::timer::RefreshTimer;
use super::traits::{KeyValueStore, OAuthClientTrait, WindowOpener, WindowSpec};
use super::types::{AuthStatus, TokenSet, UserInfo};

type SharedRefresh = Shared<BoxFuture<'static, Result<TokenSet, AuthError>>>;

/// Orchestrator behavior knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthSettings {
    pub code_verifier_length: usize,
    pub state_length: usize,
    /// Log out when a timer-driven refresh fails
    pub auto_logout_on_expiry: bool,
    /// Geometry requested for the login and logout windows
    pub window: WindowSpec,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            code_verifier_length: DEFAULT_VERIFIER_LENGTH,
            state_length: DEFAULT_STATE_LENGTH,
            auto_logout_on_expiry: true,
            window: WindowSpec::default(),
        }
    }
}

/// OAuth + PKCE session orchestrator
pub struct AuthService<C = OAuthClient, S = Arc<dyn KeyValueStore>>
where
    C: OAuthClientTrait + 'static,
    S: KeyValueStore + 'static,
{
    inner: Arc<Inner<C, S>>,
}

impl<C, S> Clone for AuthService<C, S>
where
    C: OAuthClientTrait + 'static,
    S: KeyValueStore + 'static,
{
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

struct Inner<C, S> {
    client: Arc<C>,
    store: Arc<TokenStore<S>>,
    opener: Arc<dyn WindowOpener>,
    settings: AuthSettings,
    timer: RefreshTimer,
    in_flight: Mutex<Option<(u64, SharedRefresh)>>,
    refresh_seq: AtomicU64,
    /// Bumped on logout; a refresh that started in an earlier epoch must not
    /// write tokens back
    session_epoch: AtomicU64,
    /// Expiry (millis) of the last grant this process obtained, or
    /// `NO_GRANT`
    issued_expiry: AtomicI64,
}

const NO_GRANT: i64 = i64::MIN;

impl<C, S> AuthService<C, S>
where
    C: OAuthClientTrait + 'static,
    S: KeyValueStore + 'static,
{
    pub fn new(
        client: Arc<C>,
        store: Arc<TokenStore<S>>,
        opener: Arc<dyn WindowOpener>,
        settings: AuthSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                client,
                store,
                opener,
                settings,
                timer: RefreshTimer::new(),
                in_flight: Mutex::new(None),
                refresh_seq: AtomicU64::new(0),
                session_epoch: AtomicU64::new(0),
                issued_expiry: AtomicI64::new(NO_GRANT),
            }),
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<TokenStore<S>> {
        &self.inner.store
    }

    #[must_use]
    pub fn settings(&self) -> &AuthSettings {
        &self.inner.settings
    }

    /// Resume proactive refresh for a session persisted by an earlier run
    ///
    /// Arms the timer only when stored tokens exist and are not yet inside
    /// the refresh threshold; otherwise the next status check refreshes
    /// inline.
    ///
    /// # Errors
    /// Returns error if the store cannot be read
    pub async fn initialize(&self) -> Result<(), AuthError> {
        match self.inner.store.get_tokens().await? {
            Some(tokens) if !self.inner.store.is_expired(tokens.expires_at) => {
                info!(expires_at = %tokens.expires_at, "Resuming stored session");
                self.inner.schedule_refresh(tokens.expires_at);
            }
            Some(_) => debug!("Stored session is stale; deferring refresh to first status check"),
            None => debug!("No stored session"),
        }
        Ok(())
    }

    /// Start a login: persist fresh PKCE material and open the provider's
    /// authorization page
    ///
    /// A second call before the callback replaces the first attempt's
    /// material, so the first attempt's callback will fail state validation.
    ///
    /// # Returns
    /// The authorization URL that was opened
    ///
    /// # Errors
    /// [`AuthError::OAuth`] if PKCE generation, persistence or the window
    /// request fails
    pub async fn login(&self) -> Result<String, AuthError> {
        let settings = &self.inner.settings;
        let challenge =
            PKCEChallenge::with_lengths(settings.code_verifier_length, settings.state_length)
                .map_err(|e| AuthError::OAuth(format!("Failed to generate PKCE material: {e}")))?;

        self.inner
            .store
            .store_pending_pkce(&challenge.code_verifier, &challenge.state)
            .await
            .map_err(|e| AuthError::OAuth(format!("Failed to persist PKCE material: {e}")))?;

        let url = self.inner.client.authorization_url(&challenge);
        self.inner
            .opener
            .open(&url, settings.window)
            .await
            .map_err(|e| AuthError::OAuth(format!("Failed to open authorization window: {e}")))?;

        info!("Opened authorization window");
        Ok(url)
    }

    /// Complete a login from the provider's redirect
    ///
    /// Pending PKCE material is consumed before anything else, whatever the
    /// outcome: a retried or duplicated callback fails with "PKCE data not
    /// found" and the user has to start over with [`Self::login`].
    ///
    /// # Errors
    /// - [`AuthError::OAuth`] for malformed parameters, missing PKCE
    ///   material or a state mismatch
    /// - any error from the code exchange, user info fetch or persistence
    pub async fn handle_callback(&self, code: &str, state: &str) -> Result<TokenSet, AuthError> {
        validate_callback_param("code", code)?;
        validate_callback_param("state", state)?;

        let pending = self
            .inner
            .store
            .take_pending_pkce()
            .await?
            .ok_or_else(|| AuthError::OAuth("PKCE data not found".to_string()))?;

        if !validate_state(state, &pending.state) {
            warn!("OAuth state mismatch; rejecting callback");
            return Err(AuthError::OAuth("invalid state".to_string()));
        }

        let tokens = self.inner.client.exchange_code(code, &pending.code_verifier).await?;
        self.inner.store.store_tokens(&tokens).await?;

        let user = match self.fetch_and_store_user(&tokens).await {
            Ok(user) => user,
            Err(e) => {
                // Tokens without a profile would read as Loading with no
                // timer to move them on
                warn!(error = %e, "Profile fetch failed after code exchange; discarding tokens");
                if let Err(clear) = self.inner.store.clear_all().await {
                    error!(error = %clear, "Failed to discard tokens of incomplete login");
                }
                return Err(e);
            }
        };

        self.inner.record_issued(&tokens);
        self.inner.schedule_refresh(tokens.expires_at);
        info!(subject = %user.subject, expires_at = %tokens.expires_at, "Login completed");
        Ok(tokens)
    }

    async fn fetch_and_store_user(&self, tokens: &TokenSet) -> Result<UserInfo, AuthError> {
        let user = self.inner.client.fetch_user_info(&tokens.access_token).await?;
        self.inner.store.store_user_info(&user).await?;
        Ok(user)
    }

    /// Dispatch a message relayed by a landing page
    ///
    /// # Returns
    /// `Some(tokens)` for a completed login, `None` for a sign-out
    /// acknowledgement
    ///
    /// # Errors
    /// Validation failures, provider-reported authorization errors, and
    /// anything [`Self::handle_callback`] returns
    pub async fn handle_message(
        &self,
        message: CallbackMessage,
    ) -> Result<Option<TokenSet>, AuthError> {
        message.validate()?;
        debug!(kind = message.kind(), "Received callback message");

        match message {
            CallbackMessage::Success { code, state } => {
                self.handle_callback(&code, &state).await.map(Some)
            }
            CallbackMessage::Error { error, error_description } => {
                if let Err(e) = self.inner.store.clear_pending_pkce().await {
                    warn!(error = %e, "Failed to clear pending PKCE material");
                }
                warn!(error = %error, "Provider reported an authorization error");
                Err(AuthError::OAuth(error_description.filter(|d| !d.is_empty()).unwrap_or(error)))
            }
            CallbackMessage::SignoutSuccess => {
                info!("Provider sign-out completed");
                Ok(None)
            }
        }
    }

    /// Derive the session status
    ///
    /// **May perform network I/O**: stale tokens are refreshed inline (one
    /// refresh, which itself retries). Failures never escape; a storage
    /// failure yields [`AuthStatus::Error`].
    pub async fn get_auth_state(&self) -> AuthStatus {
        match self.resolve_auth_state().await {
            Ok(status) => status,
            Err(e) => {
                error!(error = %e, "Failed to determine auth state");
                AuthStatus::Error
            }
        }
    }

    async fn resolve_auth_state(&self) -> Result<AuthStatus, AuthError> {
        let Some(tokens) = self.inner.store.get_tokens().await? else {
            return Ok(AuthStatus::Unauthenticated);
        };

        if self.inner.needs_refresh(&tokens) {
            return Ok(match self.refresh_tokens().await {
                Ok(_) => AuthStatus::Authenticated,
                Err(e) => {
                    warn!(error = %e, "Inline token refresh failed");
                    AuthStatus::Unauthenticated
                }
            });
        }

        Ok(match self.inner.store.get_user_info().await? {
            Some(_) => AuthStatus::Authenticated,
            None => AuthStatus::Loading,
        })
    }

    /// Access token that is safe to send right now, refreshing if needed
    ///
    /// Never fails: `None` means the caller should send the user back
    /// through login.
    pub async fn get_valid_access_token(&self) -> Option<String> {
        let tokens = match self.inner.store.get_tokens().await {
            Ok(Some(tokens)) => tokens,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Failed to read stored tokens");
                return None;
            }
        };

        if !self.inner.needs_refresh(&tokens) {
            return Some(tokens.access_token);
        }

        match self.refresh_tokens().await {
            Ok(refreshed) => Some(refreshed.access_token),
            Err(e) => {
                warn!(error = %e, "Could not obtain a valid access token");
                None
            }
        }
    }

    /// Refresh the stored grant, persist it and re-arm the timer
    ///
    /// Concurrent callers share one in-flight refresh.
    ///
    /// # Errors
    /// [`AuthError::InvalidToken`] without stored tokens, otherwise the
    /// refresh or persistence error
    pub async fn refresh_tokens(&self) -> Result<TokenSet, AuthError> {
        self.inner.refresh_tokens().await
    }

    /// End the session locally and at the provider
    ///
    /// Local state is always cleared; the provider logout page is opened
    /// only when tokens existed, and a failure to open it is logged, not
    /// returned.
    ///
    /// # Errors
    /// [`AuthError::Unknown`] if the store could not be cleared after a
    /// retry
    pub async fn logout(&self) -> Result<(), AuthError> {
        self.inner.logout().await
    }

    /// Cached profile of the signed-in user
    ///
    /// # Errors
    /// Returns error if the store cannot be read
    pub async fn current_user(&self) -> Result<Option<UserInfo>, AuthError> {
        Ok(self.inner.store.get_user_info().await?)
    }

    /// Whether a login is waiting for its callback
    pub async fn has_pending_login(&self) -> bool {
        matches!(self.inner.store.get_pending_pkce().await, Ok(Some(_)))
    }

    /// Whether a proactive refresh is scheduled
    #[must_use]
    pub fn has_pending_refresh_timer(&self) -> bool {
        self.inner.timer.is_armed()
    }
}

impl<C, S> Inner<C, S>
where
    C: OAuthClientTrait + 'static,
    S: KeyValueStore + 'static,
{
    async fn refresh_tokens(self: &Arc<Self>) -> Result<TokenSet, AuthError> {
        let (id, refresh) = {
            let mut slot = self.in_flight.lock().await;
            if let Some((id, existing)) = slot.as_ref() {
                debug!("Joining in-flight token refresh");
                (*id, existing.clone())
            } else {
                let id = self.refresh_seq.fetch_add(1, Ordering::SeqCst);
                let refresh = Arc::clone(self).refresh_and_store().boxed().shared();
                *slot = Some((id, refresh.clone()));
                (id, refresh)
            }
        };

        let result = refresh.await;

        let mut slot = self.in_flight.lock().await;
        if slot.as_ref().is_some_and(|(current, _)| *current == id) {
            *slot = None;
        }
        result
    }

    async fn refresh_and_store(self: Arc<Self>) -> Result<TokenSet, AuthError> {
        let epoch = self.session_epoch.load(Ordering::SeqCst);
        let tokens = self
            .store
            .get_tokens()
            .await?
            .ok_or_else(|| AuthError::InvalidToken("No stored tokens to refresh".to_string()))?;

        let refreshed = self.client.refresh(&tokens).await?;

        if self.session_epoch.load(Ordering::SeqCst) != epoch {
            return Err(AuthError::InvalidToken("Session ended during refresh".to_string()));
        }
        self.store.store_tokens(&refreshed).await?;
        self.record_issued(&refreshed);
        self.schedule_refresh(refreshed.expires_at);
        Ok(refreshed)
    }

    fn record_issued(&self, tokens: &TokenSet) {
        self.issued_expiry.store(tokens.expires_at.timestamp_millis(), Ordering::SeqCst);
    }

    /// Inside the refresh threshold, except for a grant this process just
    /// obtained that has not really expired: a provider lifetime shorter
    /// than the threshold must not turn every status check into a refresh
    fn needs_refresh(&self, tokens: &TokenSet) -> bool {
        if !self.store.is_expired(tokens.expires_at) {
            return false;
        }
        let just_issued =
            self.issued_expiry.load(Ordering::SeqCst) == tokens.expires_at.timestamp_millis();
        !(just_issued && Utc::now() < tokens.expires_at)
    }

    /// Arm the one-shot timer for `expires_at - threshold`, replacing any
    /// pending one; a non-positive delay leaves no timer armed
    fn schedule_refresh(self: &Arc<Self>, expires_at: DateTime<Utc>) {
        let fire_at = expires_at - self.store.refresh_threshold();
        let Some(delay) = (fire_at - Utc::now()).to_std().ok().filter(|d| !d.is_zero()) else {
            self.timer.cancel();
            debug!(expires_at = %expires_at, "Token already inside refresh threshold; timer not armed");
            return;
        };

        let weak = Arc::downgrade(self);
        self.timer.arm(
            delay,
            async move {
                if let Some(inner) = weak.upgrade() {
                    inner.on_timer_fired().await;
                }
            }
            .boxed(),
        );
    }

    async fn on_timer_fired(self: Arc<Self>) {
        info!("Proactive token refresh triggered");
        match self.refresh_tokens().await {
            Ok(tokens) => debug!(expires_at = %tokens.expires_at, "Proactive refresh succeeded"),
            Err(e) if self.settings.auto_logout_on_expiry => {
                warn!(error = %e, "Proactive refresh failed; logging out");
                if let Err(e) = self.logout().await {
                    error!(error = %e, "Auto-logout failed");
                }
            }
            Err(e) => {
                warn!(error = %e, "Proactive refresh failed; keeping stale tokens for next check");
            }
        }
    }

    async fn logout(&self) -> Result<(), AuthError> {
        self.timer.cancel();
        self.session_epoch.fetch_add(1, Ordering::SeqCst);
        self.issued_expiry.store(NO_GRANT, Ordering::SeqCst);

        let had_tokens = match self.store.get_tokens().await {
            Ok(tokens) => tokens.is_some(),
            Err(e) => {
                warn!(error = %e, "Failed to read tokens during logout");
                false
            }
        };

        if let Err(first) = self.store.clear_all().await {
            warn!(error = %first, "Failed to clear auth data; retrying");
            self.store.clear_all().await?;
        }

        if had_tokens {
            let url = self.client.logout_url();
            if let Err(e) = self.opener.open(&url, self.settings.window).await {
                warn!(error = %e, "Failed to open provider logout page");
            }
        }

        info!(had_tokens, "Logged out");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::service with mock collaborators.
    use std::time::Duration;

    use chrono::Duration as ChronoDuration;

    use super::*;
    use crate::auth::storage::MemoryStore;
    use crate::auth::store::compute_expiry;
    use crate::testing::{FailingStore, MockOAuthClient, MockWindowOpener};

    struct Harness {
        service: AuthService<MockOAuthClient, MemoryStore>,
        client: Arc<MockOAuthClient>,
        opener: Arc<MockWindowOpener>,
    }

    fn harness_with(settings: AuthSettings) -> Harness {
        let client = Arc::new(MockOAuthClient::new());
        let opener = Arc::new(MockWindowOpener::new());
        let store = Arc::new(TokenStore::new(MemoryStore::new(), Duration::from_secs(300)));
        let service = AuthService::new(
            Arc::clone(&client),
            store,
            Arc::clone(&opener) as Arc<dyn WindowOpener>,
            settings,
        );
        Harness { service, client, opener }
    }

    fn harness() -> Harness {
        harness_with(AuthSettings::default())
    }

    fn tokens(access: &str, expires_in: i64) -> TokenSet {
        TokenSet::new(
            access.to_string(),
            Some("refresh-1".to_string()),
            Some("id-1".to_string()),
            compute_expiry(expires_in),
        )
    }

    async fn state_of_pending_login(harness: &Harness) -> String {
        harness
            .service
            .store()
            .get_pending_pkce()
            .await
            .expect("Failed to read")
            .expect("No pending login")
            .state
    }

    #[tokio::test]
    async fn test_login_persists_pkce_and_opens_window() {
        let h = harness();
        let url = h.service.login().await.expect("Login failed");

        let pending = h.service.store().get_pending_pkce().await.expect("Failed to read").expect("No PKCE");
        assert_eq!(pending.code_verifier.len(), 128);
        assert_eq!(pending.state.len(), 32);
        assert_eq!(h.opener.opened(), vec![url.clone()]);
        assert!(url.contains(&pending.state));
        assert_eq!(h.opener.last_spec(), Some(WindowSpec { width: 500, height: 600 }));
    }

    #[tokio::test]
    async fn test_login_fails_with_oauth_error_when_opener_fails() {
        let h = harness();
        h.opener.fail_next("no display");
        let err = h.service.login().await.expect_err("Expected failure");
        assert!(matches!(err, AuthError::OAuth(_)));
    }

    /// Validates the full callback path with mocks.
    ///
    /// Assertions:
    /// - Confirms tokens and user info are persisted.
    /// - Ensures the refresh timer is armed and pending PKCE consumed.
    #[tokio::test]
    async fn test_handle_callback_success() {
        let h = harness();
        h.client.set_exchange_response(Ok(tokens("access-1", 3600)));
        h.service.login().await.expect("Login failed");
        let state = state_of_pending_login(&h).await;

        let issued = h.service.handle_callback("code-1", &state).await.expect("Callback failed");

        assert_eq!(issued.access_token, "access-1");
        assert_eq!(h.client.exchanged_codes(), vec!["code-1".to_string()]);
        let stored = h.service.store().get_tokens().await.expect("Failed to read").expect("No tokens");
        assert_eq!(stored.access_token, "access-1");
        assert!(h.service.current_user().await.expect("Failed to read").is_some());
        assert!(h.service.has_pending_refresh_timer());
        assert!(!h.service.has_pending_login().await);
        assert_eq!(h.service.get_auth_state().await, AuthStatus::Authenticated);
    }

    #[tokio::test]
    async fn test_handle_callback_without_pending_pkce() {
        let h = harness();
        let err = h.service.handle_callback("code", "state").await.expect_err("Expected failure");
        assert_eq!(err, AuthError::OAuth("PKCE data not found".to_string()));
        assert_eq!(h.client.exchange_calls(), 0);
    }

    /// Validates state mismatch rejection and one-shot PKCE consumption.
    #[tokio::test]
    async fn test_handle_callback_state_mismatch_consumes_pending() {
        let h = harness();
        h.service.login().await.expect("Login failed");
        let state = state_of_pending_login(&h).await;

        let err = h.service.handle_callback("code", "forged").await.expect_err("Expected failure");
        assert_eq!(err, AuthError::OAuth("invalid state".to_string()));
        assert_eq!(h.client.exchange_calls(), 0);

        // The genuine callback now arrives too late
        let err = h.service.handle_callback("code", &state).await.expect_err("Expected failure");
        assert_eq!(err, AuthError::OAuth("PKCE data not found".to_string()));
        assert!(h.service.store().get_tokens().await.expect("Failed to read").is_none());
    }

    #[tokio::test]
    async fn test_handle_callback_rejects_malformed_params_before_store() {
        let h = harness();
        h.service.login().await.expect("Login failed");

        let err =
            h.service.handle_callback("code with spaces", "s").await.expect_err("Expected failure");
        assert!(matches!(err, AuthError::OAuth(_)));
        assert!(h.service.has_pending_login().await, "malformed input must not consume PKCE");
    }

    #[tokio::test]
    async fn test_handle_callback_propagates_exchange_failure() {
        let h = harness();
        h.client.set_exchange_response(Err(AuthError::Network("connection reset".to_string())));
        h.service.login().await.expect("Login failed");
        let state = state_of_pending_login(&h).await;

        let err = h.service.handle_callback("code", &state).await.expect_err("Expected failure");
        assert!(matches!(err, AuthError::Network(_)));
        assert!(!h.service.has_pending_login().await);
        assert!(!h.service.has_pending_refresh_timer());
    }

    /// Validates that a login whose profile fetch fails leaves no session.
    ///
    /// Assertions:
    /// - Ensures the profile error reaches the caller.
    /// - Confirms the exchanged tokens are discarded and no timer is armed.
    /// - Ensures the session reads as signed out, not loading.
    #[tokio::test]
    async fn test_handle_callback_profile_failure_discards_tokens() {
        let h = harness();
        h.client.set_exchange_response(Ok(tokens("access-1", 3600)));
        h.client.set_user_response(Err(AuthError::Network("userInfo returned 503".to_string())));
        h.service.login().await.expect("Login failed");
        let state = state_of_pending_login(&h).await;

        let err = h.service.handle_callback("code-1", &state).await.expect_err("Expected failure");

        assert!(matches!(err, AuthError::Network(_)));
        assert!(h.service.store().get_tokens().await.expect("Failed to read").is_none());
        assert!(!h.service.has_pending_refresh_timer());
        assert_eq!(h.service.get_auth_state().await, AuthStatus::Unauthenticated);
    }

    #[tokio::test]
    async fn test_handle_message_error_clears_pending() {
        let h = harness();
        h.service.login().await.expect("Login failed");

        let err = h
            .service
            .handle_message(CallbackMessage::Error {
                error: "access_denied".to_string(),
                error_description: Some("User cancelled login".to_string()),
            })
            .await
            .expect_err("Expected failure");

        assert_eq!(err, AuthError::OAuth("User cancelled login".to_string()));
        assert!(!h.service.has_pending_login().await);
    }

    #[tokio::test]
    async fn test_handle_message_signout_is_acknowledged() {
        let h = harness();
        let outcome =
            h.service.handle_message(CallbackMessage::SignoutSuccess).await.expect("Unexpected error");
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn test_auth_state_loading_without_user_info() {
        let h = harness();
        h.service.store().store_tokens(&tokens("access-1", 3600)).await.expect("Failed to store");
        assert_eq!(h.service.get_auth_state().await, AuthStatus::Loading);
        assert_eq!(h.client.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn test_auth_state_refresh_failure_is_unauthenticated() {
        let h = harness();
        h.client.push_refresh_response(Err(AuthError::RefreshFailed("invalid_grant".to_string())));
        h.service.store().store_tokens(&tokens("stale", -1)).await.expect("Failed to store");

        assert_eq!(h.service.get_auth_state().await, AuthStatus::Unauthenticated);
        assert_eq!(h.client.refresh_calls(), 1);
    }

    #[tokio::test]
    async fn test_auth_state_storage_failure_is_error() {
        let store = Arc::new(TokenStore::new(FailingStore, Duration::from_secs(300)));
        let service = AuthService::new(
            Arc::new(MockOAuthClient::new()),
            store,
            Arc::new(MockWindowOpener::new()),
            AuthSettings::default(),
        );
        assert_eq!(service.get_auth_state().await, AuthStatus::Error);
        assert!(service.get_valid_access_token().await.is_none());
    }

    #[tokio::test]
    async fn test_valid_access_token_paths() {
        let h = harness();
        assert!(h.service.get_valid_access_token().await.is_none());

        h.service.store().store_tokens(&tokens("fresh", 3600)).await.expect("Failed to store");
        assert_eq!(h.service.get_valid_access_token().await.as_deref(), Some("fresh"));
        assert_eq!(h.client.refresh_calls(), 0);

        h.service.store().store_tokens(&tokens("stale", 10)).await.expect("Failed to store");
        h.client.push_refresh_response(Ok(tokens("renewed", 3600)));
        assert_eq!(h.service.get_valid_access_token().await.as_deref(), Some("renewed"));

        h.service.store().store_tokens(&tokens("stale", 10)).await.expect("Failed to store");
        h.client.push_refresh_response(Err(AuthError::RefreshFailed("gone".to_string())));
        assert!(h.service.get_valid_access_token().await.is_none());
    }

    /// Validates the single-flight guard.
    ///
    /// Assertions:
    /// - Ensures five concurrent refreshes reach the provider once.
    /// - Confirms every caller receives the same access token.
    #[tokio::test]
    async fn test_concurrent_refreshes_share_one_call() {
        let h = harness();
        h.client.set_refresh_delay(Duration::from_millis(50));
        h.client.push_refresh_response(Ok(tokens("shared", 3600)));
        h.service.store().store_tokens(&tokens("stale", -1)).await.expect("Failed to store");

        let results = futures::future::join_all((0..5).map(|_| h.service.refresh_tokens())).await;

        assert_eq!(h.client.refresh_calls(), 1);
        for result in results {
            assert_eq!(result.expect("Refresh failed").access_token, "shared");
        }

        // The guard resets once the refresh settles
        h.client.push_refresh_response(Ok(tokens("second", 3600)));
        h.service.refresh_tokens().await.expect("Refresh failed");
        assert_eq!(h.client.refresh_calls(), 2);
    }

    #[tokio::test]
    async fn test_refresh_without_tokens_is_invalid_token() {
        let h = harness();
        let err = h.service.refresh_tokens().await.expect_err("Expected failure");
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    #[tokio::test]
    async fn test_logout_with_tokens_opens_logout_page() {
        let h = harness();
        h.service.store().store_tokens(&tokens("access", 3600)).await.expect("Failed to store");
        h.service.initialize().await.expect("Initialize failed");
        assert!(h.service.has_pending_refresh_timer());

        h.service.logout().await.expect("Logout failed");

        assert!(!h.service.has_pending_refresh_timer());
        assert!(h.service.store().get_tokens().await.expect("Failed to read").is_none());
        assert_eq!(h.opener.opened(), vec![MockOAuthClient::LOGOUT_URL.to_string()]);
    }

    #[tokio::test]
    async fn test_logout_without_tokens_skips_remote_logout() {
        let h = harness();
        h.service.logout().await.expect("Logout failed");
        assert!(h.opener.opened().is_empty());
    }

    #[tokio::test]
    async fn test_logout_survives_opener_failure() {
        let h = harness();
        h.service.store().store_tokens(&tokens("access", 3600)).await.expect("Failed to store");
        h.opener.fail_next("browser missing");

        h.service.logout().await.expect("Logout failed");
        assert!(h.service.store().get_tokens().await.expect("Failed to read").is_none());
    }

    #[tokio::test]
    async fn test_initialize_skips_stale_session() {
        let h = harness();
        h.service.store().store_tokens(&tokens("stale", 60)).await.expect("Failed to store");
        h.service.initialize().await.expect("Initialize failed");
        assert!(!h.service.has_pending_refresh_timer());
    }

    /// Validates the proactive timer refreshes and re-arms.
    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_refresh() {
        let h = harness();
        h.service.store().store_tokens(&tokens("access", 360)).await.expect("Failed to store");
        h.client.push_refresh_response(Ok(tokens("proactive", 3600)));
        h.service.initialize().await.expect("Initialize failed");

        tokio::time::sleep(Duration::from_secs(61)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        assert_eq!(h.client.refresh_calls(), 1);
        let stored = h.service.store().get_tokens().await.expect("Failed to read").expect("No tokens");
        assert_eq!(stored.access_token, "proactive");
        assert!(h.service.has_pending_refresh_timer());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_failure_auto_logs_out() {
        let h = harness();
        h.service.store().store_tokens(&tokens("access", 360)).await.expect("Failed to store");
        h.client.push_refresh_response(Err(AuthError::RefreshFailed("revoked".to_string())));
        h.service.initialize().await.expect("Initialize failed");

        tokio::time::sleep(Duration::from_secs(61)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        assert!(h.service.store().get_tokens().await.expect("Failed to read").is_none());
        assert!(!h.service.has_pending_refresh_timer());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_failure_keeps_tokens_without_auto_logout() {
        let h = harness_with(AuthSettings { auto_logout_on_expiry: false, ..AuthSettings::default() });
        h.service.store().store_tokens(&tokens("access", 360)).await.expect("Failed to store");
        h.client.push_refresh_response(Err(AuthError::RefreshFailed("revoked".to_string())));
        h.service.initialize().await.expect("Initialize failed");

        tokio::time::sleep(Duration::from_secs(61)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        let stored = h.service.store().get_tokens().await.expect("Failed to read").expect("No tokens");
        assert_eq!(stored.access_token, "access");
    }

    /// Validates that a refreshed grant living less than the threshold is
    /// used until it really expires.
    ///
    /// Assertions:
    /// - Ensures the stale grant is refreshed once.
    /// - Confirms repeated status checks and token reads reuse the new grant.
    /// - Ensures a grant not issued by this process is still refreshed.
    #[tokio::test]
    async fn test_short_lived_refresh_is_not_repeated() {
        let h = harness();
        h.client.set_refresh_lifetime(120);
        h.service.store().store_tokens(&tokens("stale", -1)).await.expect("Failed to store");
        h.service.store().store_user_info(&MockOAuthClient::default_user()).await.expect("Failed to store");

        for _ in 0..5 {
            assert_eq!(h.service.get_auth_state().await, AuthStatus::Authenticated);
        }
        assert_eq!(h.service.get_valid_access_token().await.as_deref(), Some("stale-refreshed"));
        assert_eq!(h.client.refresh_calls(), 1);
        assert!(!h.service.has_pending_refresh_timer());

        h.service.store().store_tokens(&tokens("external", 60)).await.expect("Failed to store");
        assert_eq!(h.service.get_auth_state().await, AuthStatus::Authenticated);
        assert_eq!(h.client.refresh_calls(), 2);
    }

    #[tokio::test]
    async fn test_schedule_with_expiry_inside_threshold_disarms() {
        let h = harness();
        h.service.store().store_tokens(&tokens("access", 3600)).await.expect("Failed to store");
        h.service.initialize().await.expect("Initialize failed");
        assert!(h.service.has_pending_refresh_timer());

        h.service.inner.schedule_refresh(Utc::now() + ChronoDuration::seconds(10));
        assert!(!h.service.has_pending_refresh_timer());
    }
}

//! Persistent token store
//!
//! Owns every persisted piece of the session (token set, user profile,
//! pending PKCE material) on top of any [`KeyValueStore`] backend and
//! broadcasts a [`StorageChange`] after each write so observers can react
//! without polling.
//!
//! Multi-key writes and reads go through a reader/writer gate, so readers
//! never observe a token set with some fields from one grant and some from
//! another.

use std::collections::HashMap;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, warn};

use super::storage::StorageError;
use super::traits::KeyValueStore;
use super::types::{PendingPkce, TokenSet, UserInfo};

/// Persisted key names
pub mod keys {
    pub const ACCESS_TOKEN: &str = "sidepanel.auth.access_token";
    pub const REFRESH_TOKEN: &str = "sidepanel.auth.refresh_token";
    pub const ID_TOKEN: &str = "sidepanel.auth.id_token";
    pub const TOKEN_EXPIRY: &str = "sidepanel.auth.token_expiry";
    pub const USER_INFO: &str = "sidepanel.auth.user_info";
    pub const CODE_VERIFIER: &str = "sidepanel.auth.code_verifier";
    pub const OAUTH_STATE: &str = "sidepanel.auth.oauth_state";

    pub const TOKENS: [&str; 4] = [ACCESS_TOKEN, REFRESH_TOKEN, ID_TOKEN, TOKEN_EXPIRY];
    pub const PENDING_PKCE: [&str; 2] = [CODE_VERIFIER, OAUTH_STATE];
    pub const ALL: [&str; 7] =
        [ACCESS_TOKEN, REFRESH_TOKEN, ID_TOKEN, TOKEN_EXPIRY, USER_INFO, CODE_VERIFIER, OAUTH_STATE];
}

const CHANGE_CHANNEL_CAPACITY: usize = 32;

/// Keys written or removed by one store operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
    pub keys: Vec<String>,
}

impl StorageChange {
    fn of(keys: &[&str]) -> Self {
        Self { keys: keys.iter().map(|key| (*key).to_string()).collect() }
    }

    /// Whether the change affects the visible session (tokens or profile),
    /// as opposed to only pending PKCE material
    #[must_use]
    pub fn touches_session(&self) -> bool {
        self.keys
            .iter()
            .any(|key| keys::TOKENS.contains(&key.as_str()) || key == keys::USER_INFO)
    }
}

/// `now + expires_in_secs`, clamped to a non-negative lifetime
#[must_use]
pub fn compute_expiry(expires_in_secs: i64) -> DateTime<Utc> {
    Utc::now() + Duration::seconds(expires_in_secs.clamp(0, i64::from(u32::MAX)))
}

/// `now >= expires_at - threshold`
#[must_use]
pub fn is_expired_at(expires_at: DateTime<Utc>, now: DateTime<Utc>, threshold: Duration) -> bool {
    now >= expires_at - threshold
}

/// Session persistence over a key-value backend
pub struct TokenStore<S> {
    backend: S,
    gate: RwLock<()>,
    refresh_threshold: Duration,
    changes: broadcast::Sender<StorageChange>,
}

impl<S: KeyValueStore> TokenStore<S> {
    /// Create a store that treats tokens as expired `refresh_threshold`
    /// before their real expiry
    pub fn new(backend: S, refresh_threshold: StdDuration) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            backend,
            gate: RwLock::new(()),
            refresh_threshold: Duration::from_std(refresh_threshold)
                .unwrap_or_else(|_| Duration::seconds(300)),
            changes,
        }
    }

    #[must_use]
    pub const fn refresh_threshold(&self) -> Duration {
        self.refresh_threshold
    }

    /// Subscribe to change notifications
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }

    fn notify(&self, keys: &[&str]) {
        // No receivers is fine: nobody is observing yet
        let _ = self.changes.send(StorageChange::of(keys));
    }

    /// Persist all token fields as one batch
    ///
    /// # Errors
    /// Returns error if the backend write fails; nothing is applied then
    pub async fn store_tokens(&self, tokens: &TokenSet) -> Result<(), StorageError> {
        let _guard = self.gate.write().await;
        // Absent optional tokens are written as empty strings so that a stale
        // value from an older grant can never survive the batch.
        let batch = vec![
            (keys::ACCESS_TOKEN.to_string(), Value::from(tokens.access_token.as_str())),
            (
                keys::REFRESH_TOKEN.to_string(),
                Value::from(tokens.refresh_token.as_deref().unwrap_or_default()),
            ),
            (keys::ID_TOKEN.to_string(), Value::from(tokens.id_token.as_deref().unwrap_or_default())),
            (keys::TOKEN_EXPIRY.to_string(), Value::from(tokens.expires_at.timestamp_millis())),
        ];
        self.backend.set_many(batch).await?;
        debug!(expires_at = %tokens.expires_at, "Stored token set");
        self.notify(&keys::TOKENS);
        Ok(())
    }

    /// Load the token set; `None` when no access token is stored
    ///
    /// # Errors
    /// Returns error if the backend read fails
    pub async fn get_tokens(&self) -> Result<Option<TokenSet>, StorageError> {
        let _guard = self.gate.read().await;
        let values = self.backend.get_many(&keys::TOKENS).await?;

        let Some(access_token) = string_value(&values, keys::ACCESS_TOKEN) else {
            return Ok(None);
        };
        let expires_at = values
            .get(keys::TOKEN_EXPIRY)
            .and_then(Value::as_i64)
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
            .unwrap_or_else(|| {
                warn!("Stored token set has no usable expiry; treating it as expired");
                DateTime::<Utc>::default()
            });

        Ok(Some(TokenSet {
            access_token,
            refresh_token: string_value(&values, keys::REFRESH_TOKEN),
            id_token: string_value(&values, keys::ID_TOKEN),
            expires_at,
        }))
    }

    /// # Errors
    /// Returns error if serialization or the backend write fails
    pub async fn store_user_info(&self, user: &UserInfo) -> Result<(), StorageError> {
        let value = serde_json::to_value(user)?;
        let _guard = self.gate.write().await;
        self.backend.set_many(vec![(keys::USER_INFO.to_string(), value)]).await?;
        self.notify(&[keys::USER_INFO]);
        Ok(())
    }

    /// # Errors
    /// Returns error if the backend read fails or the stored profile is
    /// malformed
    pub async fn get_user_info(&self) -> Result<Option<UserInfo>, StorageError> {
        let _guard = self.gate.read().await;
        let mut values = self.backend.get_many(&[keys::USER_INFO]).await?;
        match values.remove(keys::USER_INFO) {
            Some(Value::Null) | None => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
        }
    }

    /// Persist PKCE material for the login attempt in progress, replacing
    /// any earlier attempt's
    ///
    /// # Errors
    /// Returns error if the backend write fails
    pub async fn store_pending_pkce(
        &self,
        code_verifier: &str,
        state: &str,
    ) -> Result<(), StorageError> {
        let _guard = self.gate.write().await;
        self.backend
            .set_many(vec![
                (keys::CODE_VERIFIER.to_string(), Value::from(code_verifier)),
                (keys::OAUTH_STATE.to_string(), Value::from(state)),
            ])
            .await?;
        self.notify(&keys::PENDING_PKCE);
        Ok(())
    }

    /// Peek at the pending PKCE material; `None` without a stored verifier
    ///
    /// # Errors
    /// Returns error if the backend read fails
    pub async fn get_pending_pkce(&self) -> Result<Option<PendingPkce>, StorageError> {
        let _guard = self.gate.read().await;
        self.read_pending().await
    }

    /// Read and delete the pending PKCE material in one step
    ///
    /// # Errors
    /// Returns error if the backend read or removal fails
    pub async fn take_pending_pkce(&self) -> Result<Option<PendingPkce>, StorageError> {
        let _guard = self.gate.write().await;
        let pending = self.read_pending().await?;
        self.backend.remove_many(&keys::PENDING_PKCE).await?;
        self.notify(&keys::PENDING_PKCE);
        Ok(pending)
    }

    /// # Errors
    /// Returns error if the backend removal fails
    pub async fn clear_pending_pkce(&self) -> Result<(), StorageError> {
        let _guard = self.gate.write().await;
        self.backend.remove_many(&keys::PENDING_PKCE).await?;
        self.notify(&keys::PENDING_PKCE);
        Ok(())
    }

    async fn read_pending(&self) -> Result<Option<PendingPkce>, StorageError> {
        let values = self.backend.get_many(&keys::PENDING_PKCE).await?;
        Ok(string_value(&values, keys::CODE_VERIFIER).map(|code_verifier| PendingPkce {
            code_verifier,
            state: string_value(&values, keys::OAUTH_STATE).unwrap_or_default(),
        }))
    }

    /// Remove tokens, profile and pending PKCE material
    ///
    /// # Errors
    /// Returns error if the backend removal fails
    pub async fn clear_all(&self) -> Result<(), StorageError> {
        let _guard = self.gate.write().await;
        self.backend.remove_many(&keys::ALL).await?;
        debug!("Cleared all stored auth data");
        self.notify(&keys::ALL);
        Ok(())
    }

    /// Proactive expiry check: true once `now >= expires_at - threshold`
    #[must_use]
    pub fn is_expired(&self, expires_at: DateTime<Utc>) -> bool {
        is_expired_at(expires_at, Utc::now(), self.refresh_threshold)
    }

    /// `now + expires_in_secs`
    #[must_use]
    pub fn compute_expiry(&self, expires_in_secs: i64) -> DateTime<Utc> {
        compute_expiry(expires_in_secs)
    }
}

fn string_value(values: &HashMap<String, Value>, key: &str) -> Option<String> {
    values.get(key).and_then(Value::as_str).filter(|value| !value.is_empty()).map(str::to_string)
}

//! Reactive session view for UI consumers.
//!
//! [`AuthObserver`] publishes an [`AuthView`] over a `watch` channel and
//! re-derives it whenever the token store reports a change to tokens or the
//! user profile, so the view follows refreshes and logouts made by any
//! component sharing the store.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::error::AuthError;
use super::service::AuthService;
use super::traits::{KeyValueStore, OAuthClientTrait};
use super::types::{AuthStatus, UserInfo};

/// Snapshot of the session as a UI renders it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthView {
    /// True until the first status check resolves
    pub checking: bool,
    pub logged_in: bool,
    pub user: Option<UserInfo>,
}

impl Default for AuthView {
    fn default() -> Self {
        Self { checking: true, logged_in: false, user: None }
    }
}

pub struct AuthObserver<C, S>
where
    C: OAuthClientTrait + 'static,
    S: KeyValueStore + 'static,
{
    service: AuthService<C, S>,
    view: Arc<watch::Sender<AuthView>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl<C, S> AuthObserver<C, S>
where
    C: OAuthClientTrait + 'static,
    S: KeyValueStore + 'static,
{
    #[must_use]
    pub fn new(service: AuthService<C, S>) -> Self {
        let (view, _) = watch::channel(AuthView::default());
        Self { service, view: Arc::new(view), listener: Mutex::new(None) }
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthView> {
        self.view.subscribe()
    }

    #[must_use]
    pub fn view(&self) -> AuthView {
        self.view.borrow().clone()
    }

    /// Run the initial check and follow store changes until dropped
    ///
    /// Calling `start` again restarts the listener. Must be called from
    /// within a tokio runtime.
    pub fn start(&self) {
        // Subscribe before spawning so no change between now and the first
        // poll of the task is missed
        let mut changes = self.service.store().subscribe();
        let service = self.service.clone();
        let view = Arc::clone(&self.view);

        let handle = tokio::spawn(async move {
            publish(&service, &view).await;
            loop {
                match changes.recv().await {
                    Ok(change) if change.touches_session() => {
                        debug!(keys = ?change.keys, "Session storage changed");
                        publish(&service, &view).await;
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Missed storage notifications; re-checking");
                        publish(&service, &view).await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        if let Some(previous) = self.listener.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Re-derive the view now
    pub async fn refresh(&self) -> AuthView {
        publish(&self.service, &self.view).await;
        self.view()
    }

    /// Log out through the service and publish the resulting view
    ///
    /// # Errors
    /// Returns error if local session state could not be cleared
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let result = self.service.logout().await;
        publish(&self.service, &self.view).await;
        result
    }
}

impl<C, S> Drop for AuthObserver<C, S>
where
    C: OAuthClientTrait + 'static,
    S: KeyValueStore + 'static,
{
    fn drop(&mut self) {
        if let Some(handle) = self.listener.lock().take() {
            handle.abort();
        }
    }
}

async fn publish<C, S>(service: &AuthService<C, S>, view: &watch::Sender<AuthView>)
where
    C: OAuthClientTrait + 'static,
    S: KeyValueStore + 'static,
{
    let status = service.get_auth_state().await;
    let logged_in = status == AuthStatus::Authenticated;
    let user = if logged_in {
        service.current_user().await.unwrap_or_else(|e| {
            warn!(error = %e, "Failed to read user profile");
            None
        })
    } else {
        None
    };

    view.send_replace(AuthView { checking: false, logged_in, user });
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::observer.
    use std::time::Duration;

    use super::*;
    use crate::auth::service::AuthSettings;
    use crate::auth::storage::MemoryStore;
    use crate::auth::store::{compute_expiry, TokenStore};
    use crate::auth::types::TokenSet;
    use crate::testing::{MockOAuthClient, MockWindowOpener};

    fn observer() -> AuthObserver<MockOAuthClient, MemoryStore> {
        observer_with(Arc::new(MockOAuthClient::new()))
    }

    fn observer_with(client: Arc<MockOAuthClient>) -> AuthObserver<MockOAuthClient, MemoryStore> {
        let store = Arc::new(TokenStore::new(MemoryStore::new(), Duration::from_secs(300)));
        let service = AuthService::new(
            client,
            store,
            Arc::new(MockWindowOpener::new()),
            AuthSettings::default(),
        );
        AuthObserver::new(service)
    }

    fn user() -> UserInfo {
        serde_json::from_value(serde_json::json!({"sub": "u-1", "email": "ada@example.com"}))
            .expect("Failed to build user")
    }

    async fn wait_for(
        rx: &mut watch::Receiver<AuthView>,
        predicate: impl Fn(&AuthView) -> bool,
    ) -> AuthView {
        tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|view| predicate(view)))
            .await
            .expect("Timed out waiting for view")
            .expect("Observer dropped")
            .clone()
    }

    #[tokio::test]
    async fn test_initial_view_is_checking() {
        let observer = observer();
        assert_eq!(observer.view(), AuthView::default());
        assert!(observer.view().checking);
    }

    /// Validates that the view follows store changes.
    ///
    /// Assertions:
    /// - Ensures the first check clears `checking`.
    /// - Confirms a login written to the store flips `logged_in`.
    /// - Confirms logout flips it back.
    #[tokio::test]
    async fn test_view_follows_store_changes() {
        let observer = observer();
        let mut rx = observer.subscribe();
        observer.start();

        let view = wait_for(&mut rx, |v| !v.checking).await;
        assert!(!view.logged_in);

        let store = observer.service.store();
        store
            .store_tokens(&TokenSet::new("a".to_string(), None, None, compute_expiry(3600)))
            .await
            .expect("Failed to store");
        store.store_user_info(&user()).await.expect("Failed to store");

        let view = wait_for(&mut rx, |v| v.logged_in && v.user.is_some()).await;
        assert_eq!(view.user.map(|u| u.subject), Some("u-1".to_string()));

        observer.sign_out().await.expect("Sign out failed");
        let view = wait_for(&mut rx, |v| !v.logged_in).await;
        assert!(view.user.is_none());
    }

    /// Validates that a grant shorter than the refresh threshold does not
    /// feed back into the listener.
    ///
    /// Assertions:
    /// - Ensures the stale session is refreshed exactly once.
    /// - Confirms the observer's own store writes trigger no further
    ///   provider calls while idle.
    #[tokio::test]
    async fn test_short_lived_grant_refreshes_once() {
        let client = Arc::new(MockOAuthClient::new());
        client.set_refresh_lifetime(120);
        let observer = observer_with(Arc::clone(&client));

        let store = observer.service.store();
        store
            .store_tokens(&TokenSet::new(
                "stale".to_string(),
                Some("refresh-1".to_string()),
                None,
                compute_expiry(-1),
            ))
            .await
            .expect("Failed to store");
        store.store_user_info(&user()).await.expect("Failed to store");

        let mut rx = observer.subscribe();
        observer.start();
        let view = wait_for(&mut rx, |v| v.logged_in).await;
        assert!(view.user.is_some());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(client.refresh_calls(), 1);
        assert!(observer.view().logged_in);
    }

    #[tokio::test]
    async fn test_refresh_without_listener() {
        let observer = observer();
        let view = observer.refresh().await;
        assert!(!view.checking);
        assert!(!view.logged_in);
    }
}

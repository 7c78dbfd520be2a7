//! Application context - dependency injection container

use std::sync::Arc;
use std::time::Duration;

use sidepanel_common::auth::{
    AuthObserver, AuthService, AuthSettings, KeyValueStore, OAuthClient, RetryPolicy, TokenStore,
    WindowOpener, WindowSpec,
};
use sidepanel_domain::{Config, Result, SidepanelError};
use sidepanel_infra::config::to_oauth_config;
use sidepanel_infra::{open_store, SystemBrowserOpener};

/// Type alias for the storage backend trait object
pub type DynStore = Arc<dyn KeyValueStore>;

/// Orchestrator as wired by the host
pub type SessionService = AuthService<OAuthClient, DynStore>;

/// Observer as wired by the host
pub type SessionObserver = AuthObserver<OAuthClient, DynStore>;

/// Application context - holds all services and dependencies
pub struct AppContext {
    pub config: Config,
    pub auth: SessionService,
    pub observer: Arc<SessionObserver>,
}

impl AppContext {
    /// Build the context with the configured storage and the system browser
    ///
    /// # Errors
    /// Returns `SidepanelError::Config` if the configuration is invalid, or
    /// `SidepanelError::Auth` if a stored session cannot be read
    pub async fn new(config: Config) -> Result<Self> {
        let store = open_store(&config.storage);
        Self::new_with(config, store, Arc::new(SystemBrowserOpener)).await
    }

    /// Build the context around explicit collaborators (tests, headless
    /// hosts)
    ///
    /// # Errors
    /// Same as [`Self::new`]
    pub async fn new_with(
        config: Config,
        backend: DynStore,
        opener: Arc<dyn WindowOpener>,
    ) -> Result<Self> {
        config.validate()?;

        let refresh = &config.token_refresh;
        let client = OAuthClient::new(to_oauth_config(&config)).with_retry_policy(RetryPolicy::new(
            refresh.max_retry_attempts,
            Duration::from_millis(refresh.retry_delay_ms),
        ));
        let store =
            Arc::new(TokenStore::new(backend, Duration::from_secs(refresh.refresh_threshold_secs)));
        let settings = AuthSettings {
            code_verifier_length: config.pkce.code_verifier_length,
            state_length: config.pkce.state_length,
            auto_logout_on_expiry: config.session.auto_logout_on_token_expiry,
            window: WindowSpec {
                width: config.session.popup_width,
                height: config.session.popup_height,
            },
        };

        let auth = AuthService::new(Arc::new(client), store, opener, settings);
        auth.initialize()
            .await
            .map_err(|e| SidepanelError::Auth(format!("Failed to resume session: {e}")))?;
        let observer = Arc::new(AuthObserver::new(auth.clone()));

        tracing::info!(
            backend = ?config.storage.backend,
            refresh_threshold_secs = refresh.refresh_threshold_secs,
            "Application context ready"
        );
        Ok(Self { config, auth, observer })
    }
}

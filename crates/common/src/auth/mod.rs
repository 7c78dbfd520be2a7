//! OAuth 2.0 + PKCE authentication core
//!
//! Signs a user in against a Cognito-style hosted UI, keeps the session's
//! tokens fresh and exposes the session state to UI consumers.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  AuthObserver   │  Reactive view (checking / logged_in / user)
//! └────────┬────────┘
//!          │
//! ┌────────▼────────┐
//! │   AuthService   │  Login, callback, refresh, logout, proactive timer
//! └────────┬────────┘
//!          │
//!          ├──► OAuthClient        (authorize / token / userInfo / logout)
//!          ├──► TokenStore         (typed, atomic, change notifications)
//!          │         │
//!          │         └──► KeyValueStore   (memory, file, keychain)
//!          ├──► WindowOpener       (popup / browser)
//!          └──► PKCE utilities     (verifier, challenge, state)
//! ```
//!
//! # Usage Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use async_trait::async_trait;
//! use sidepanel_common::auth::{
//!     AuthService, AuthSettings, MemoryStore, OAuthClient, OAuthConfig, TokenStore,
//!     WindowOpener, WindowSpec,
//! };
//!
//! struct PrintOpener;
//!
//! #[async_trait]
//! impl WindowOpener for PrintOpener {
//!     async fn open(&self, url: &str, _spec: WindowSpec) -> Result<(), String> {
//!         println!("Open this URL in your browser: {url}");
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = OAuthConfig::new(
//!         "https://tenant.auth.us-east-1.amazoncognito.com",
//!         "your_client_id",
//!         "http://127.0.0.1:8765/callback",
//!         "http://127.0.0.1:8765/signout",
//!         vec!["email".to_string(), "openid".to_string(), "profile".to_string()],
//!     );
//!
//!     let store = Arc::new(TokenStore::new(MemoryStore::new(), Duration::from_secs(300)));
//!     let service = AuthService::new(
//!         Arc::new(OAuthClient::new(config)),
//!         store,
//!         Arc::new(PrintOpener),
//!         AuthSettings::default(),
//!     );
//!
//!     service.initialize().await?;
//!     service.login().await?;
//!
//!     // ... the redirect lands with `code` and `state` ...
//!     let tokens = service.handle_callback("authorization_code", "state").await?;
//!     println!("Logged in until {}", tokens.expires_at);
//!
//!     if let Some(token) = service.get_valid_access_token().await {
//!         println!("Bearer {token}");
//!     }
//!     service.logout().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - **[`types`]**: `TokenSet`, `UserInfo`, `AuthStatus`, `OAuthConfig`
//! - **[`pkce`]**: PKCE challenge generation and state validation
//! - **[`client`]**: Provider protocol client with bounded refresh retries
//! - **[`store`]**: Typed token store over a [`KeyValueStore`]
//! - **[`service`]**: Auth orchestrator
//! - **[`observer`]**: Reactive session view
//! - **[`callback`]**: Messages relayed by the redirect landing pages
//!
//! # Security Features
//!
//! - **PKCE**: S256 challenge, no client secret
//! - **State Validation**: constant-time comparison, one-shot PKCE material
//! - **Untrusted input**: callback parameters are shape-checked before use
//! - **No secrets in logs**: tokens, verifiers and codes are never logged

pub mod callback;
pub mod client;
pub mod error;
#[cfg(feature = "platform")]
pub mod keychain;
pub mod observer;
pub mod pkce;
pub mod service;
pub mod storage;
pub mod store;
pub mod timer;
pub mod traits;
pub mod types;

pub use callback::{validate_callback_param, CallbackMessage};
pub use client::{OAuthClient, RetryPolicy};
pub use error::{AuthError, AuthErrorKind};
#[cfg(feature = "platform")]
pub use keychain::KeychainStore;
pub use observer::{AuthObserver, AuthView};
pub use pkce::{generate_code_challenge, generate_code_verifier, validate_state, PKCEChallenge};
pub use service::{AuthService, AuthSettings};
pub use storage::{MemoryStore, StorageError};
pub use store::{StorageChange, TokenStore};
pub use timer::RefreshTimer;
pub use traits::{KeyValueStore, OAuthClientTrait, WindowOpener, WindowSpec};
pub use types::{AuthStatus, OAuthConfig, PendingPkce, TokenResponse, TokenSet, UserInfo};

//! OAuth 2.0 protocol client with PKCE support
//!
//! Speaks to the provider's hosted-UI endpoints:
//! - authorization URL building (`/oauth2/authorize`)
//! - authorization code exchange and refresh (`/oauth2/token`)
//! - OIDC profile lookup (`/oauth2/userInfo`)
//! - logout URL building (`/logout`)
//!
//! The client never touches the token store; callers persist results.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use tracing::{debug, info, warn};

use super::error::AuthError;
use super::pkce::PKCEChallenge;
use super::store::compute_expiry;
use super::traits::OAuthClientTrait;
use super::types::{OAuthConfig, OAuthErrorResponse, TokenResponse, TokenSet, UserInfo};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Refresh retry policy: `max_attempts` calls, waiting
/// `base_delay * attempt` after each failed attempt but the last
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, base_delay: Duration::from_millis(1000) }
    }
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self { max_attempts, base_delay }
    }

    /// Delay after failed attempt number `attempt` (1-based)
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

/// OAuth 2.0 client for a Cognito-style hosted UI
///
/// Implements RFC 6749 (OAuth 2.0) and RFC 7636 (PKCE) for a public client.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    config: OAuthConfig,
    client: Client,
    retry: RetryPolicy,
}

impl OAuthClient {
    /// Create a new OAuth client with the given configuration
    ///
    /// # Examples
    /// ```
    /// use sidepanel_common::auth::{OAuthClient, OAuthClientTrait, OAuthConfig};
    ///
    /// let config = OAuthConfig::new(
    ///     "https://tenant.auth.us-east-1.amazoncognito.com",
    ///     "client_id",
    ///     "http://127.0.0.1:8765/callback",
    ///     "http://127.0.0.1:8765/signout",
    ///     vec!["openid".to_string()],
    /// );
    /// let client = OAuthClient::new(config);
    /// assert!(client.logout_url().contains("client_id=client_id"));
    /// ```
    #[must_use]
    pub fn new(config: OAuthConfig) -> Self {
        let builder = Client::builder().timeout(REQUEST_TIMEOUT);
        let builder = if std::env::var_os("SIDEPANEL_DISABLE_PROXY").is_some() {
            builder.no_proxy()
        } else {
            builder
        };
        let client = builder.build().unwrap_or_else(|_| Client::new());

        Self { config, client, retry: RetryPolicy::default() }
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Get a reference to the OAuth configuration
    #[must_use]
    pub const fn config(&self) -> &OAuthConfig {
        &self.config
    }

    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// POST a form to the token endpoint and decode the grant
    async fn post_token(&self, params: &[(&str, &str)]) -> Result<TokenResponse, AuthError> {
        let response = self
            .client
            .post(self.config.token_endpoint())
            .form(params)
            .send()
            .await
            .map_err(|e| AuthError::Network(format!("Token request failed: {e}")))?;

        let response = ensure_oauth_success(response).await?;
        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| AuthError::OAuth(format!("Malformed token response: {e}")))
    }

    async fn refresh_once(&self, refresh_token: &str) -> Result<TokenResponse, AuthError> {
        self.post_token(&[
            ("grant_type", "refresh_token"),
            ("client_id", self.config.client_id.as_str()),
            ("refresh_token", refresh_token),
        ])
        .await
    }
}

/// Pass 2xx responses through; turn anything else into
/// [`AuthError::OAuth`] carrying the provider's description
async fn ensure_oauth_success(response: Response) -> Result<Response, AuthError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let error: OAuthErrorResponse = serde_json::from_str(&body).unwrap_or_default();
    let message = error.message_or(&format!("Token request failed with status {status}"));
    debug!(status = %status, error = ?error.error, "Provider rejected token request");
    Err(AuthError::OAuth(message))
}

#[async_trait]
impl OAuthClientTrait for OAuthClient {
    fn authorization_url(&self, challenge: &PKCEChallenge) -> String {
        let scope_string = self.config.scope_string();

        let mut params = vec![
            ("client_id", self.config.client_id.as_str()),
            ("response_type", "code"),
            ("scope", scope_string.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("state", challenge.state.as_str()),
            ("code_challenge", challenge.code_challenge.as_str()),
            ("code_challenge_method", challenge.challenge_method()),
        ];

        if let Some(identity_provider) = &self.config.identity_provider {
            params.push(("identity_provider", identity_provider.as_str()));
        }

        format!("{}?{}", self.config.authorization_endpoint(), encode_query(&params))
    }

    fn logout_url(&self) -> String {
        let params =
            [("client_id", self.config.client_id.as_str()), ("logout_uri", self.config.logout_uri.as_str())];
        format!("{}?{}", self.config.logout_endpoint(), encode_query(&params))
    }

    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenSet, AuthError> {
        let response = self
            .post_token(&[
                ("grant_type", "authorization_code"),
                ("client_id", self.config.client_id.as_str()),
                ("code", code),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("code_verifier", code_verifier),
            ])
            .await?;

        let expires_at = compute_expiry(response.expires_in);
        info!(expires_at = %expires_at, "Exchanged authorization code for tokens");
        Ok(TokenSet::from_response(response, expires_at, None))
    }

    async fn refresh(&self, tokens: &TokenSet) -> Result<TokenSet, AuthError> {
        let Some(refresh_token) = tokens.usable_refresh_token() else {
            return Err(AuthError::InvalidToken("No refresh token available".to_string()));
        };

        let max_attempts = self.retry.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            match self.refresh_once(refresh_token).await {
                Ok(response) => {
                    let expires_at = compute_expiry(response.expires_in);
                    info!(attempt, expires_at = %expires_at, "Refreshed access token");
                    return Ok(TokenSet::from_response(
                        response,
                        expires_at,
                        Some(refresh_token.to_string()),
                    ));
                }
                Err(err) => {
                    warn!(attempt, max_attempts, error = %err, "Token refresh attempt failed");
                    last_error = err.to_string();
                    if attempt < max_attempts {
                        tokio::time::sleep(self.retry.delay_after(attempt)).await;
                    }
                }
            }
        }

        Err(AuthError::RefreshFailed(format!(
            "Failed to refresh token after {max_attempts} attempts: {last_error}"
        )))
    }

    async fn fetch_user_info(&self, access_token: &str) -> Result<UserInfo, AuthError> {
        let response = self
            .client
            .get(self.config.user_info_endpoint())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::Network(format!("User info request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Network(format!(
                "User info request failed with status {status}"
            )));
        }

        response
            .json::<UserInfo>()
            .await
            .map_err(|e| AuthError::Network(format!("Malformed user info response: {e}")))
    }
}

fn encode_query(params: &[(&str, &str)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

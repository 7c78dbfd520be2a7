//! OAuth 2.0 types and structures
//!
//! Data carried through the login lifecycle: the token set issued by the
//! provider, the OIDC user profile, the pending PKCE material persisted
//! between `login()` and the callback, and the derived session status.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// One authorization grant issued by the provider
///
/// Replaced wholesale on refresh. `expires_at` is always an absolute
/// instant, computed once from the provider's `expires_in` when the grant
/// was received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    /// Access token for API authentication
    pub access_token: String,

    /// Refresh token for obtaining new access tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// ID token (JWT) containing user claims (OpenID Connect)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,

    /// Absolute expiration timestamp (UTC)
    pub expires_at: DateTime<Utc>,
}

impl TokenSet {
    #[must_use]
    pub const fn new(
        access_token: String,
        refresh_token: Option<String>,
        id_token: Option<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self { access_token, refresh_token, id_token, expires_at }
    }

    /// Build a token set from a token-endpoint response.
    ///
    /// When the provider omits `refresh_token` (typical for the refresh
    /// grant) the `previous_refresh_token` is carried over.
    #[must_use]
    pub fn from_response(
        response: TokenResponse,
        expires_at: DateTime<Utc>,
        previous_refresh_token: Option<String>,
    ) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response
                .refresh_token
                .filter(|token| !token.is_empty())
                .or(previous_refresh_token),
            id_token: response.id_token,
            expires_at,
        }
    }

    /// Refresh token, if one is present and non-empty
    #[must_use]
    pub fn usable_refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref().filter(|token| !token.is_empty())
    }

    /// Get seconds until token expiration (negative once expired)
    #[must_use]
    pub fn seconds_until_expiry(&self) -> i64 {
        (self.expires_at - Utc::now()).num_seconds()
    }
}

/// OAuth token response from the authorization server
///
/// Standard OAuth 2.0 token response format (RFC 6749 §5.1).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    pub expires_in: i64,
}

/// OIDC user profile returned by the `userInfo` endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(rename = "sub")]
    pub subject: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, deserialize_with = "bool_or_string")]
    pub email_verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

impl UserInfo {
    /// Best human-readable label: full name, then given name, then email
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.is_empty())
            .or_else(|| self.given_name.as_deref().filter(|name| !name.is_empty()))
            .unwrap_or(&self.email)
    }
}

// Cognito-style providers send `"email_verified": "true"`.
fn bool_or_string<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(value) => value,
        Flag::Text(text) => text.eq_ignore_ascii_case("true"),
    })
}

/// PKCE material awaiting its callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPkce {
    pub code_verifier: String,
    pub state: String,
}

/// Derived session status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthStatus {
    Loading,
    Authenticated,
    Unauthenticated,
    Error,
}

impl fmt::Display for AuthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Loading => "loading",
            Self::Authenticated => "authenticated",
            Self::Unauthenticated => "unauthenticated",
            Self::Error => "error",
        };
        f.write_str(label)
    }
}

/// Identity provider endpoints and client registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthConfig {
    /// Base URL of the hosted UI (scheme included, no trailing path)
    pub domain: String,

    pub client_id: String,

    /// Where the provider redirects with `code`/`state`
    pub redirect_uri: String,

    /// Where the provider lands after signing out
    pub logout_uri: String,

    pub scopes: Vec<String>,

    /// Federated IdP hint passed as `identity_provider`
    pub identity_provider: Option<String>,
}

impl OAuthConfig {
    #[must_use]
    pub fn new(
        domain: impl Into<String>,
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
        logout_uri: impl Into<String>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            logout_uri: logout_uri.into(),
            scopes,
            identity_provider: None,
        }
    }

    #[must_use]
    pub fn with_identity_provider(mut self, identity_provider: impl Into<String>) -> Self {
        self.identity_provider = Some(identity_provider.into());
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.domain.trim_end_matches('/'))
    }

    #[must_use]
    pub fn authorization_endpoint(&self) -> String {
        self.endpoint("/oauth2/authorize")
    }

    #[must_use]
    pub fn token_endpoint(&self) -> String {
        self.endpoint("/oauth2/token")
    }

    #[must_use]
    pub fn user_info_endpoint(&self) -> String {
        self.endpoint("/oauth2/userInfo")
    }

    #[must_use]
    pub fn logout_endpoint(&self) -> String {
        self.endpoint("/logout")
    }

    /// Get scopes as space-separated string
    #[must_use]
    pub fn scope_string(&self) -> String {
        self.scopes.join(" ")
    }
}

/// OAuth error response from authorization server
///
/// Standard OAuth 2.0 error response format (RFC 6749 §5.2). Both fields are
/// optional because providers are inconsistent about error bodies.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OAuthErrorResponse {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl OAuthErrorResponse {
    /// Description if present, then error code, then `fallback`
    #[must_use]
    pub fn message_or(&self, fallback: &str) -> String {
        self.error_description
            .as_deref()
            .or(self.error.as_deref())
            .filter(|message| !message.is_empty())
            .unwrap_or(fallback)
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::types.
    use chrono::Duration;

    use super::*;

    fn response(refresh_token: Option<&str>) -> TokenResponse {
        TokenResponse {
            access_token: "access123".to_string(),
            refresh_token: refresh_token.map(str::to_string),
            id_token: Some("id789".to_string()),
            token_type: Some("Bearer".to_string()),
            expires_in: 3600,
        }
    }

    /// Validates `TokenSet::from_response` when the provider rotates the
    /// refresh token.
    ///
    /// Assertions:
    /// - Confirms the new refresh token replaces the previous one.
    #[test]
    fn test_from_response_replaces_refresh_token() {
        let expires_at = Utc::now() + Duration::seconds(3600);
        let tokens =
            TokenSet::from_response(response(Some("rotated")), expires_at, Some("old".to_string()));

        assert_eq!(tokens.access_token, "access123");
        assert_eq!(tokens.refresh_token.as_deref(), Some("rotated"));
        assert_eq!(tokens.id_token.as_deref(), Some("id789"));
        assert_eq!(tokens.expires_at, expires_at);
    }

    /// Validates `TokenSet::from_response` when the provider omits the
    /// refresh token.
    ///
    /// Assertions:
    /// - Confirms the previous refresh token is preserved.
    /// - Confirms an empty string counts as omitted.
    #[test]
    fn test_from_response_preserves_refresh_token() {
        let expires_at = Utc::now();
        let omitted = TokenSet::from_response(response(None), expires_at, Some("old".to_string()));
        assert_eq!(omitted.refresh_token.as_deref(), Some("old"));

        let empty = TokenSet::from_response(response(Some("")), expires_at, Some("old".to_string()));
        assert_eq!(empty.refresh_token.as_deref(), Some("old"));
    }

    #[test]
    fn test_usable_refresh_token() {
        let mut tokens = TokenSet::new("a".to_string(), Some(String::new()), None, Utc::now());
        assert!(tokens.usable_refresh_token().is_none());
        tokens.refresh_token = Some("r".to_string());
        assert_eq!(tokens.usable_refresh_token(), Some("r"));
    }

    #[test]
    fn test_token_response_minimal_body() {
        let parsed: TokenResponse =
            serde_json::from_str(r#"{"access_token":"a","expires_in":3600}"#)
                .expect("Failed to parse token response");
        assert!(parsed.refresh_token.is_none());
        assert!(parsed.id_token.is_none());
    }

    /// Validates `UserInfo` parsing of a Cognito-style payload.
    ///
    /// Assertions:
    /// - Confirms `sub` maps to `subject`.
    /// - Confirms string `"true"` is accepted for `email_verified`.
    /// - Confirms absent optional claims stay `None`.
    #[test]
    fn test_user_info_parses_string_flag() {
        let info: UserInfo = serde_json::from_str(
            r#"{"sub":"u-1","email":"a@example.com","email_verified":"true","given_name":"Ada","username":"ada"}"#,
        )
        .expect("Failed to parse user info");

        assert_eq!(info.subject, "u-1");
        assert!(info.email_verified);
        assert_eq!(info.given_name.as_deref(), Some("Ada"));
        assert!(info.picture.is_none());
        assert_eq!(info.display_name(), "Ada");
    }

    #[test]
    fn test_display_name_skips_empty_name() {
        let info: UserInfo = serde_json::from_str(
            r#"{"sub":"u-3","email":"c@example.com","name":"","given_name":"Grace"}"#,
        )
        .expect("Failed to parse user info");
        assert_eq!(info.display_name(), "Grace");

        let info: UserInfo = serde_json::from_str(
            r#"{"sub":"u-4","email":"d@example.com","name":"","given_name":""}"#,
        )
        .expect("Failed to parse user info");
        assert_eq!(info.display_name(), "d@example.com");
    }

    #[test]
    fn test_user_info_round_trips_through_storage_shape() {
        let info: UserInfo =
            serde_json::from_str(r#"{"sub":"u-2","email":"b@example.com","email_verified":false}"#)
                .expect("Failed to parse user info");
        let stored = serde_json::to_value(&info).expect("Failed to serialize");
        assert_eq!(stored["sub"], "u-2");
        assert!(stored.get("name").is_none());
        assert_eq!(info.display_name(), "b@example.com");
    }

    /// Validates `OAuthConfig` endpoint construction.
    ///
    /// Assertions:
    /// - Confirms endpoints are joined without a doubled slash.
    /// - Confirms `scope_string` is space-separated.
    #[test]
    fn test_oauth_config_endpoints() {
        let config = OAuthConfig::new(
            "https://tenant.auth.example.com/",
            "client123",
            "http://127.0.0.1:8765/callback",
            "http://127.0.0.1:8765/signout",
            vec!["email".to_string(), "openid".to_string()],
        );

        assert_eq!(config.authorization_endpoint(), "https://tenant.auth.example.com/oauth2/authorize");
        assert_eq!(config.token_endpoint(), "https://tenant.auth.example.com/oauth2/token");
        assert_eq!(config.user_info_endpoint(), "https://tenant.auth.example.com/oauth2/userInfo");
        assert_eq!(config.logout_endpoint(), "https://tenant.auth.example.com/logout");
        assert_eq!(config.scope_string(), "email openid");
    }

    #[test]
    fn test_oauth_error_response_message() {
        let described = OAuthErrorResponse {
            error: Some("invalid_grant".to_string()),
            error_description: Some("Refresh Token has expired".to_string()),
        };
        assert_eq!(described.message_or("fallback"), "Refresh Token has expired");

        let bare = OAuthErrorResponse { error: Some("invalid_request".to_string()), error_description: None };
        assert_eq!(bare.message_or("fallback"), "invalid_request");

        assert_eq!(OAuthErrorResponse::default().message_or("fallback"), "fallback");
    }

    #[test]
    fn test_auth_status_display() {
        assert_eq!(AuthStatus::Authenticated.to_string(), "authenticated");
        assert_eq!(
            serde_json::to_value(AuthStatus::Unauthenticated).expect("Failed to serialize"),
            "unauthenticated"
        );
    }
}

//! Configuration management

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CODE_VERIFIER_LENGTH, DEFAULT_KEYCHAIN_SERVICE, DEFAULT_LOGOUT_URI,
    DEFAULT_MAX_RETRY_ATTEMPTS, DEFAULT_POPUP_HEIGHT, DEFAULT_POPUP_WIDTH, DEFAULT_REDIRECT_URI,
    DEFAULT_REFRESH_THRESHOLD_SECS, DEFAULT_RETRY_DELAY_MS, DEFAULT_SCOPES, DEFAULT_STATE_LENGTH,
    MAX_CODE_VERIFIER_LENGTH, MIN_CODE_VERIFIER_LENGTH,
};
use crate::errors::{Result, SidepanelError};

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderConfig,
    pub token_refresh: TokenRefreshConfig,
    pub pkce: PkceConfig,
    pub session: SessionConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Identity provider (hosted UI) settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Base URL of the hosted UI, e.g. `https://tenant.auth.us-east-1.amazoncognito.com`
    pub domain: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub logout_uri: String,
    pub scopes: Vec<String>,
    /// Federated IdP hint (`identity_provider=` on the authorize URL)
    pub identity_provider: Option<String>,
}

/// Proactive refresh and retry policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenRefreshConfig {
    pub refresh_threshold_secs: u64,
    pub max_retry_attempts: u32,
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PkceConfig {
    pub code_verifier_length: usize,
    pub state_length: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub auto_logout_on_token_expiry: bool,
    pub popup_width: u32,
    pub popup_height: u32,
}

/// Where the session is persisted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    #[default]
    File,
    Keychain,
}

impl std::str::FromStr for StorageBackend {
    type Err = SidepanelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "file" => Ok(Self::File),
            "keychain" => Ok(Self::Keychain),
            other => Err(SidepanelError::Config(format!("unknown storage backend '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// File path for the `file` backend; defaults to the platform data dir
    pub path: Option<String>,
    pub keychain_service: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            domain: String::new(),
            client_id: String::new(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            logout_uri: DEFAULT_LOGOUT_URI.to_string(),
            scopes: DEFAULT_SCOPES.iter().map(|s| (*s).to_string()).collect(),
            identity_provider: None,
        }
    }
}

impl Default for TokenRefreshConfig {
    fn default() -> Self {
        Self {
            refresh_threshold_secs: DEFAULT_REFRESH_THRESHOLD_SECS,
            max_retry_attempts: DEFAULT_MAX_RETRY_ATTEMPTS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}

impl Default for PkceConfig {
    fn default() -> Self {
        Self {
            code_verifier_length: DEFAULT_CODE_VERIFIER_LENGTH,
            state_length: DEFAULT_STATE_LENGTH,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auto_logout_on_token_expiry: true,
            popup_width: DEFAULT_POPUP_WIDTH,
            popup_height: DEFAULT_POPUP_HEIGHT,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: None,
            keychain_service: DEFAULT_KEYCHAIN_SERVICE.to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::default() }
    }
}

impl Config {
    /// Reject configurations that cannot drive a login.
    ///
    /// # Errors
    /// Returns [`SidepanelError::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let provider = &self.provider;
        if provider.domain.trim().is_empty() {
            return Err(SidepanelError::Config("provider.domain is required".to_string()));
        }
        let domain = url::Url::parse(&provider.domain).map_err(|e| {
            SidepanelError::Config(format!("provider.domain is not a valid URL: {e}"))
        })?;
        if !matches!(domain.scheme(), "http" | "https") {
            return Err(SidepanelError::Config(
                "provider.domain must use http or https".to_string(),
            ));
        }
        if provider.client_id.trim().is_empty() {
            return Err(SidepanelError::Config("provider.client_id is required".to_string()));
        }
        let parse_uri = |field: &str, value: &str| {
            url::Url::parse(value).map_err(|e| {
                SidepanelError::Config(format!("provider.{field} is not a valid URL: {e}"))
            })
        };
        let redirect = parse_uri("redirect_uri", &provider.redirect_uri)?;
        let logout = parse_uri("logout_uri", &provider.logout_uri)?;
        // Both are served by the same loopback listener
        if redirect.host_str() == logout.host_str()
            && redirect.port_or_known_default() == logout.port_or_known_default()
            && redirect.path() == logout.path()
        {
            return Err(SidepanelError::Config(
                "provider.redirect_uri and provider.logout_uri must use different paths".to_string(),
            ));
        }
        if provider.scopes.is_empty() {
            return Err(SidepanelError::Config("provider.scopes must not be empty".to_string()));
        }

        let verifier_len = self.pkce.code_verifier_length;
        if !(MIN_CODE_VERIFIER_LENGTH..=MAX_CODE_VERIFIER_LENGTH).contains(&verifier_len) {
            return Err(SidepanelError::Config(format!(
                "pkce.code_verifier_length must be within {MIN_CODE_VERIFIER_LENGTH}..={MAX_CODE_VERIFIER_LENGTH}, got {verifier_len}"
            )));
        }
        if self.pkce.state_length == 0 {
            return Err(SidepanelError::Config("pkce.state_length must be positive".to_string()));
        }
        if self.token_refresh.max_retry_attempts == 0 {
            return Err(SidepanelError::Config(
                "token_refresh.max_retry_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

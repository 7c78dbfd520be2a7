//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If incomplete, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `SIDEPANEL_AUTH_DOMAIN`: Hosted UI base URL (required)
//! - `SIDEPANEL_CLIENT_ID`: OAuth client id (required)
//! - `SIDEPANEL_REDIRECT_URI`: Callback landing page
//! - `SIDEPANEL_LOGOUT_URI`: Sign-out landing page
//! - `SIDEPANEL_OAUTH_SCOPES`: Space or comma separated scopes
//! - `SIDEPANEL_IDENTITY_PROVIDER`: Federated IdP hint
//! - `SIDEPANEL_STORAGE_BACKEND`: `memory`, `file` or `keychain`
//! - `SIDEPANEL_STORAGE_PATH`: Session file for the `file` backend
//! - `SIDEPANEL_REFRESH_THRESHOLD_SECS`: Proactive refresh lead time
//! - `SIDEPANEL_AUTO_LOGOUT`: Log out when a background refresh fails
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `$SIDEPANEL_CONFIG`
//! 2. `./sidepanel.toml`
//! 3. `./config/sidepanel.toml`
//! 4. `./sidepanel.json`
//! 5. The same names next to the executable

use std::path::{Path, PathBuf};

use sidepanel_common::auth::OAuthConfig;
use sidepanel_domain::{Config, Result, SidepanelError};

const CONFIG_FILE_NAMES: [&str; 3] = ["sidepanel.toml", "config/sidepanel.toml", "sidepanel.json"];

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If the required
/// variables are missing, falls back to loading from a config file. The
/// result is validated either way.
///
/// # Errors
/// Returns `SidepanelError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - Validation fails
pub fn load() -> Result<Config> {
    let config = match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            config
        }
        Err(e) => {
            tracing::debug!(error = %e, "Failed to load from environment, trying file");
            load_from_file(None)?
        }
    };
    config.validate()?;
    Ok(config)
}

/// Load configuration from environment variables
///
/// `SIDEPANEL_AUTH_DOMAIN` and `SIDEPANEL_CLIENT_ID` are required; every
/// other variable overrides the corresponding default when set.
///
/// # Errors
/// Returns `SidepanelError::Config` if required variables are missing
/// or have invalid values.
pub fn load_from_env() -> Result<Config> {
    let mut config = Config::default();
    config.provider.domain = env_var("SIDEPANEL_AUTH_DOMAIN")?;
    config.provider.client_id = env_var("SIDEPANEL_CLIENT_ID")?;
    apply_env_overrides(&mut config)?;
    Ok(config)
}

fn apply_env_overrides(config: &mut Config) -> Result<()> {
    if let Some(uri) = optional_env("SIDEPANEL_REDIRECT_URI") {
        config.provider.redirect_uri = uri;
    }
    if let Some(uri) = optional_env("SIDEPANEL_LOGOUT_URI") {
        config.provider.logout_uri = uri;
    }
    if let Some(scopes) = optional_env("SIDEPANEL_OAUTH_SCOPES") {
        config.provider.scopes = parse_scopes(&scopes);
    }
    if let Some(idp) = optional_env("SIDEPANEL_IDENTITY_PROVIDER") {
        config.provider.identity_provider = Some(idp);
    }
    if let Some(backend) = optional_env("SIDEPANEL_STORAGE_BACKEND") {
        config.storage.backend = backend.parse()?;
    }
    if let Some(path) = optional_env("SIDEPANEL_STORAGE_PATH") {
        config.storage.path = Some(path);
    }
    if let Some(threshold) = optional_env("SIDEPANEL_REFRESH_THRESHOLD_SECS") {
        config.token_refresh.refresh_threshold_secs = threshold.parse::<u64>().map_err(|e| {
            SidepanelError::Config(format!("Invalid refresh threshold: {e}"))
        })?;
    }
    config.session.auto_logout_on_token_expiry =
        env_bool("SIDEPANEL_AUTO_LOGOUT", config.session.auto_logout_on_token_expiry);
    Ok(())
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `SidepanelError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(SidepanelError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            SidepanelError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| SidepanelError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
///
/// # Errors
/// Returns `SidepanelError::Config` if format is invalid or parsing fails.
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| SidepanelError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| SidepanelError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(SidepanelError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(explicit) = optional_env("SIDEPANEL_CONFIG") {
        candidates.push(PathBuf::from(explicit));
    }

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(CONFIG_FILE_NAMES.iter().map(|name| cwd.join(name)));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(CONFIG_FILE_NAMES.iter().map(|name| exe_dir.join(name)));
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

/// Provider settings in the shape the protocol client expects
#[must_use]
pub fn to_oauth_config(config: &Config) -> OAuthConfig {
    let provider = &config.provider;
    let oauth = OAuthConfig::new(
        provider.domain.clone(),
        provider.client_id.clone(),
        provider.redirect_uri.clone(),
        provider.logout_uri.clone(),
        provider.scopes.clone(),
    );
    match &provider.identity_provider {
        Some(idp) => oauth.with_identity_provider(idp.clone()),
        None => oauth,
    }
}

fn parse_scopes(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|scope| !scope.is_empty())
        .map(str::to_string)
        .collect()
}

/// Get required environment variable
///
/// # Errors
/// Returns `SidepanelError::Config` if the variable is not set.
fn env_var(key: &str) -> Result<String> {
    optional_env(key).ok_or_else(|| {
        SidepanelError::Config(format!("Missing required environment variable: {key}"))
    })
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use sidepanel_domain::StorageBackend;

    use super::*;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ENV_KEYS: [&str; 11] = [
        "SIDEPANEL_AUTH_DOMAIN",
        "SIDEPANEL_CLIENT_ID",
        "SIDEPANEL_REDIRECT_URI",
        "SIDEPANEL_LOGOUT_URI",
        "SIDEPANEL_OAUTH_SCOPES",
        "SIDEPANEL_IDENTITY_PROVIDER",
        "SIDEPANEL_STORAGE_BACKEND",
        "SIDEPANEL_STORAGE_PATH",
        "SIDEPANEL_REFRESH_THRESHOLD_SECS",
        "SIDEPANEL_AUTO_LOGOUT",
        "SIDEPANEL_CONFIG",
    ];

    fn clear_env() {
        for key in ENV_KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_env_bool_parsing() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");

        for value in ["1", "true", "yes", "on", "TRUE"] {
            std::env::set_var("SIDEPANEL_TEST_BOOL", value);
            assert!(env_bool("SIDEPANEL_TEST_BOOL", false), "{value}");
        }
        for value in ["0", "false", "no", "off"] {
            std::env::set_var("SIDEPANEL_TEST_BOOL", value);
            assert!(!env_bool("SIDEPANEL_TEST_BOOL", true), "{value}");
        }

        std::env::remove_var("SIDEPANEL_TEST_BOOL");
        assert!(env_bool("SIDEPANEL_TEST_BOOL", true));
        assert!(!env_bool("SIDEPANEL_TEST_BOOL", false));
    }

    #[test]
    fn test_load_from_env_all_vars_set() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("SIDEPANEL_AUTH_DOMAIN", "https://tenant.auth.example.com");
        std::env::set_var("SIDEPANEL_CLIENT_ID", "client-123");
        std::env::set_var("SIDEPANEL_REDIRECT_URI", "http://127.0.0.1:9000/callback");
        std::env::set_var("SIDEPANEL_OAUTH_SCOPES", "openid, email profile");
        std::env::set_var("SIDEPANEL_IDENTITY_PROVIDER", "Google");
        std::env::set_var("SIDEPANEL_STORAGE_BACKEND", "memory");
        std::env::set_var("SIDEPANEL_REFRESH_THRESHOLD_SECS", "120");
        std::env::set_var("SIDEPANEL_AUTO_LOGOUT", "off");

        let config = load_from_env().expect("Should load config from env vars");
        clear_env();

        assert_eq!(config.provider.domain, "https://tenant.auth.example.com");
        assert_eq!(config.provider.client_id, "client-123");
        assert_eq!(config.provider.redirect_uri, "http://127.0.0.1:9000/callback");
        assert_eq!(config.provider.scopes, vec!["openid", "email", "profile"]);
        assert_eq!(config.provider.identity_provider.as_deref(), Some("Google"));
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.token_refresh.refresh_threshold_secs, 120);
        assert!(!config.session.auto_logout_on_token_expiry);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_env_missing_var() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        std::env::set_var("SIDEPANEL_AUTH_DOMAIN", "https://tenant.auth.example.com");

        let err = load_from_env().expect_err("Should fail with missing client id");
        clear_env();
        assert!(matches!(err, SidepanelError::Config(_)), "Should be a Config error");
        assert!(err.to_string().contains("SIDEPANEL_CLIENT_ID"));
    }

    #[test]
    fn test_load_from_env_invalid_number() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        std::env::set_var("SIDEPANEL_AUTH_DOMAIN", "https://tenant.auth.example.com");
        std::env::set_var("SIDEPANEL_CLIENT_ID", "client-123");
        std::env::set_var("SIDEPANEL_REFRESH_THRESHOLD_SECS", "soon");

        let result = load_from_env();
        clear_env();
        assert!(matches!(result, Err(SidepanelError::Config(_))));
    }

    #[test]
    fn test_load_from_file_toml() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("sidepanel.toml");
        std::fs::write(
            &path,
            r#"
[provider]
domain = "https://tenant.auth.example.com"
client_id = "abc"

[token_refresh]
max_retry_attempts = 5

[logging]
format = "json"
"#,
        )
        .expect("Failed to write config");

        let config = load_from_file(Some(path)).expect("Should load config from TOML file");
        assert_eq!(config.provider.client_id, "abc");
        assert_eq!(config.token_refresh.max_retry_attempts, 5);
        assert_eq!(config.token_refresh.refresh_threshold_secs, 300);
        assert_eq!(config.logging.format, sidepanel_domain::LogFormat::Json);
    }

    #[test]
    fn test_load_from_file_json() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("sidepanel.json");
        std::fs::write(
            &path,
            r#"{"provider": {"domain": "https://tenant.auth.example.com", "client_id": "json-client"},
                "storage": {"backend": "keychain"}}"#,
        )
        .expect("Failed to write config");

        let config = load_from_file(Some(path)).expect("Should load config from JSON file");
        assert_eq!(config.provider.client_id, "json-client");
        assert_eq!(config.storage.backend, StorageBackend::Keychain);
    }

    #[test]
    fn test_load_from_file_not_found() {
        let result = load_from_file(Some(PathBuf::from("/nonexistent/sidepanel.toml")));
        assert!(matches!(result, Err(SidepanelError::Config(_))));
    }

    #[test]
    fn test_load_from_file_invalid_json() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("sidepanel.json");
        std::fs::write(&path, r#"{ "provider": "#).expect("Failed to write config");

        assert!(load_from_file(Some(path)).is_err());
    }

    #[test]
    fn test_parse_config_unsupported_format() {
        let result = parse_config("some content", Path::new("sidepanel.yaml"));
        assert!(result.is_err(), "Should fail with unsupported format");
    }

    #[test]
    fn test_probe_honours_explicit_path() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "").expect("Failed to write config");

        std::env::set_var("SIDEPANEL_CONFIG", &path);
        let probed = probe_config_paths();
        clear_env();
        assert_eq!(probed, Some(path));
    }

    #[test]
    fn test_to_oauth_config_carries_identity_provider() {
        let mut config = Config::default();
        config.provider.domain = "https://tenant.auth.example.com".to_string();
        config.provider.client_id = "abc".to_string();
        config.provider.identity_provider = Some("Google".to_string());

        let oauth = to_oauth_config(&config);
        assert_eq!(oauth.client_id, "abc");
        assert_eq!(oauth.identity_provider.as_deref(), Some("Google"));
        assert_eq!(oauth.token_endpoint(), "https://tenant.auth.example.com/oauth2/token");
    }
}

//! Application constants
//!
//! Protocol and session defaults shared by every crate.

// Token refresh defaults
pub const DEFAULT_REFRESH_THRESHOLD_SECS: u64 = 300;
pub const DEFAULT_MAX_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

// PKCE (RFC 7636 bounds the verifier to 43..=128 characters)
pub const DEFAULT_CODE_VERIFIER_LENGTH: usize = 128;
pub const MIN_CODE_VERIFIER_LENGTH: usize = 43;
pub const MAX_CODE_VERIFIER_LENGTH: usize = 128;
pub const DEFAULT_STATE_LENGTH: usize = 32;

// Session window geometry
pub const DEFAULT_POPUP_WIDTH: u32 = 500;
pub const DEFAULT_POPUP_HEIGHT: u32 = 600;

pub const DEFAULT_SCOPES: &[&str] = &["email", "openid", "profile"];
pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8765/callback";
pub const DEFAULT_LOGOUT_URI: &str = "http://127.0.0.1:8765/signout";
pub const DEFAULT_KEYCHAIN_SERVICE: &str = "sidepanel";
pub const DEFAULT_STORAGE_FILE: &str = "sidepanel-session.json";

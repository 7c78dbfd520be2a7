//! PKCE (Proof Key for Code Exchange) implementation for OAuth 2.0
//!
//! Implements RFC 7636 (S256 only). Every login attempt gets a fresh
//! verifier/challenge/state triple; the verifier stays local until the code
//! is redeemed and the state is echoed back by the provider for CSRF
//! protection.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use sha2::{Digest, Sha256};

/// RFC 7636 "unreserved" characters.
pub const UNRESERVED_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

pub const DEFAULT_VERIFIER_LENGTH: usize = 128;
pub const DEFAULT_STATE_LENGTH: usize = 32;
pub const MIN_VERIFIER_LENGTH: usize = 43;
pub const MAX_VERIFIER_LENGTH: usize = 128;

/// Generate a cryptographically secure random string over
/// [`UNRESERVED_CHARSET`].
///
/// Characters are sampled uniformly (no modulo bias) from the thread-local
/// CSPRNG.
#[must_use]
pub fn random_string(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| char::from(UNRESERVED_CHARSET[rng.gen_range(0..UNRESERVED_CHARSET.len())]))
        .collect()
}

/// `BASE64URL(SHA256(input))` without padding.
#[must_use]
pub fn sha256_base64url(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Generate a code verifier of `length` unreserved characters
///
/// # Errors
/// Returns error if `length` is outside RFC 7636's 43..=128 range
pub fn generate_code_verifier(length: usize) -> Result<String, String> {
    if !(MIN_VERIFIER_LENGTH..=MAX_VERIFIER_LENGTH).contains(&length) {
        return Err(format!(
            "code verifier length must be within {MIN_VERIFIER_LENGTH}..={MAX_VERIFIER_LENGTH}, got {length}"
        ));
    }
    Ok(random_string(length))
}

/// Generate code challenge from verifier using SHA256
///
/// Per RFC 7636, the challenge is BASE64URL(SHA256(ASCII(code_verifier)))
#[must_use]
pub fn generate_code_challenge(verifier: &str) -> String {
    sha256_base64url(verifier)
}

/// Validate that the state token matches
///
/// # Arguments
/// * `received` - The state received in the callback
/// * `expected` - The state that was sent in the authorization request
///
/// # Returns
/// `true` if states match, `false` otherwise
#[must_use]
pub fn validate_state(received: &str, expected: &str) -> bool {
    // constant-time for equal-length inputs
    received.len() == expected.len()
        && received.bytes().zip(expected.bytes()).fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
}

/// PKCE material for one OAuth 2.0 authorization attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PKCEChallenge {
    /// Random unreserved-charset string, kept secret until token exchange
    pub code_verifier: String,

    /// SHA256 hash of code_verifier (base64url encoded)
    pub code_challenge: String,

    /// Random CSRF protection token
    pub state: String,
}

impl PKCEChallenge {
    /// Generate a new PKCE challenge with the default lengths (128-char
    /// verifier, 32-char state)
    ///
    /// # Examples
    /// ```
    /// use sidepanel_common::auth::pkce::{sha256_base64url, PKCEChallenge};
    ///
    /// let challenge = PKCEChallenge::generate().expect("Failed to generate PKCE challenge");
    /// assert_eq!(challenge.code_verifier.len(), 128);
    /// assert_eq!(challenge.code_challenge, sha256_base64url(&challenge.code_verifier));
    /// ```
    ///
    /// # Errors
    /// Never fails with the default lengths; see [`Self::with_lengths`]
    pub fn generate() -> Result<Self, String> {
        Self::with_lengths(DEFAULT_VERIFIER_LENGTH, DEFAULT_STATE_LENGTH)
    }

    /// Generate a PKCE challenge with explicit verifier and state lengths
    ///
    /// # Errors
    /// Returns error if the verifier length is outside 43..=128 or the state
    /// length is zero
    pub fn with_lengths(verifier_length: usize, state_length: usize) -> Result<Self, String> {
        if state_length == 0 {
            return Err("state length must be positive".to_string());
        }
        let code_verifier = generate_code_verifier(verifier_length)?;
        let code_challenge = generate_code_challenge(&code_verifier);
        let state = random_string(state_length);

        Ok(Self { code_verifier, code_challenge, state })
    }

    /// Get the challenge method (always "S256" for SHA256)
    #[must_use]
    pub const fn challenge_method(&self) -> &'static str {
        "S256"
    }
}

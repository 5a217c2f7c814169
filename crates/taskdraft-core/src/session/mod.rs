//! Signed session tokens identifying the caller of the drafting endpoints.
//!
//! Tokens are HMAC-SHA256 based, scoped to a (user_id, expiry) pair.
//! Format: `td_st_<user_id>_<expires_unix>_<hmac_hex>`

pub mod verifier;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

pub use verifier::{HmacSessionVerifier, SessionVerifier};

type HmacSha256 = Hmac<Sha256>;

/// Token prefix used to identify session tokens.
const TOKEN_PREFIX: &str = "td_st_";

/// Errors that can occur during token operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid token format: {0}")]
    InvalidFormat(String),

    #[error("invalid user ID in token: {0}")]
    InvalidUserId(String),

    #[error("invalid expiry in token: {0}")]
    InvalidExpiry(String),

    #[error("token HMAC verification failed")]
    HmacMismatch,

    #[error("token expired at {0}")]
    Expired(DateTime<Utc>),
}

/// Secret used to sign and verify session tokens.
#[derive(Clone)]
pub struct SessionConfig {
    secret: Vec<u8>,
}

impl SessionConfig {
    pub fn new(secret: Vec<u8>) -> Self {
        Self { secret }
    }

    /// Build a config from a hex-encoded secret (as written to the config file).
    pub fn from_hex(secret_hex: &str) -> Result<Self, SessionError> {
        let secret = hex::decode(secret_hex.trim()).map_err(|e| {
            SessionError::InvalidFormat(format!("session secret is not valid hex: {e}"))
        })?;
        Ok(Self::new(secret))
    }
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// The authenticated caller extracted from a valid token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Issue a token for `user_id` that stops verifying at `expires_at`.
///
/// Expiry has one-second resolution; sub-second precision is dropped.
pub fn generate_session_token(
    config: &SessionConfig,
    user_id: Uuid,
    expires_at: DateTime<Utc>,
) -> String {
    let expires = expires_at.timestamp();
    let message = format!("{user_id}:{expires}");
    let mac = compute_hmac(&config.secret, message.as_bytes());
    format!("{TOKEN_PREFIX}{user_id}_{expires}_{}", hex::encode(mac))
}

/// Verify a token's signature and expiry relative to `now`.
pub fn validate_session_token(
    config: &SessionConfig,
    token: &str,
    now: DateTime<Utc>,
) -> Result<SessionClaims, SessionError> {
    let rest = token.strip_prefix(TOKEN_PREFIX).ok_or_else(|| {
        SessionError::InvalidFormat(format!("token must start with '{TOKEN_PREFIX}'"))
    })?;

    // <user_id: 36 chars>_<expires>_<hmac_hex>
    if rest.len() < 36 || !rest.is_char_boundary(36) {
        return Err(SessionError::InvalidFormat(
            "token too short to contain a valid user ID".to_string(),
        ));
    }
    let (user_id_str, after_user_id) = rest.split_at(36);
    let user_id =
        Uuid::parse_str(user_id_str).map_err(|e| SessionError::InvalidUserId(e.to_string()))?;

    let after_underscore = after_user_id.strip_prefix('_').ok_or_else(|| {
        SessionError::InvalidFormat("expected underscore after user ID".to_string())
    })?;
    let (expires_str, hmac_hex) = after_underscore.split_once('_').ok_or_else(|| {
        SessionError::InvalidFormat("expected underscore between expiry and hmac".to_string())
    })?;

    let expires: i64 = expires_str
        .parse()
        .map_err(|e: std::num::ParseIntError| SessionError::InvalidExpiry(e.to_string()))?;
    let expires_at = DateTime::<Utc>::from_timestamp(expires, 0)
        .ok_or_else(|| SessionError::InvalidExpiry(format!("{expires} is out of range")))?;

    let provided_mac = hex::decode(hmac_hex)
        .map_err(|e| SessionError::InvalidFormat(format!("invalid hex in hmac: {e}")))?;

    // Signature first, so expiry is only reported for genuine tokens.
    let message = format!("{user_id}:{expires}");
    verify_hmac_constant_time(&config.secret, message.as_bytes(), &provided_mac)?;

    if now >= expires_at {
        return Err(SessionError::Expired(expires_at));
    }

    Ok(SessionClaims {
        user_id,
        expires_at,
    })
}

fn compute_hmac(key: &[u8], message: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}

fn verify_hmac_constant_time(
    key: &[u8],
    message: &[u8],
    expected_mac: &[u8],
) -> Result<(), SessionError> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(message);
    mac.verify_slice(expected_mac)
        .map_err(|_| SessionError::HmacMismatch)
}

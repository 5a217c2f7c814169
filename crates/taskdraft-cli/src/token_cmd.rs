use anyhow::{Context, Result, bail};
use chrono::{DateTime, TimeDelta, Utc};
use uuid::Uuid;

use taskdraft_core::session::{SessionConfig, generate_session_token};

/// Mint a session token for `user_id` valid for `ttl_secs` from `now`.
pub fn mint_token(
    config: &SessionConfig,
    user_id: &str,
    ttl_secs: u64,
    now: DateTime<Utc>,
) -> Result<(String, DateTime<Utc>)> {
    if ttl_secs == 0 {
        bail!("--ttl-secs must be greater than zero");
    }
    let user_id =
        Uuid::parse_str(user_id).with_context(|| format!("invalid user ID: {user_id}"))?;
    let expires_at = i64::try_from(ttl_secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .with_context(|| format!("--ttl-secs {ttl_secs} is out of range"))?;

    Ok((generate_session_token(config, user_id, expires_at), expires_at))
}

/// Execute `taskdraft token`: print a token on stdout, expiry on stderr.
pub fn run_token(config: &SessionConfig, user_id: &str, ttl_secs: u64) -> Result<()> {
    let (token, expires_at) = mint_token(config, user_id, ttl_secs, Utc::now())?;
    println!("{token}");
    eprintln!("expires at {}", expires_at.to_rfc3339());
    Ok(())
}

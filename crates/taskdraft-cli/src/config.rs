//! Configuration file management for taskdraft.
//!
//! Provides a TOML-based config file at `~/.config/taskdraft/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use taskdraft_core::session::SessionConfig;
use taskdraft_core::{GeminiClient, GeminiConfig, TaskDrafter};

const API_KEY_VARS: [&str; 2] = ["TASKDRAFT_API_KEY", "GEMINI_API_KEY"];
const MODEL_VAR: &str = "TASKDRAFT_MODEL";
const SESSION_SECRET_VAR: &str = "TASKDRAFT_SESSION_SECRET";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub model: ModelSection,
    pub auth: AuthSection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ModelSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthSection {
    /// Hex-encoded session secret (64 hex chars = 32 bytes).
    pub session_secret: String,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the taskdraft config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/taskdraft` or `~/.config/taskdraft`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("taskdraft");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("taskdraft")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents).context("failed to parse config file")?;
    Ok(config)
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

/// Generate a random session secret: 32 random bytes, hex-encoded (64 chars).
pub fn generate_session_secret() -> String {
    use rand::Rng;
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    hex::encode(bytes)
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Everything needed to reach the model backend.
#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub gemini: GeminiConfig,
    pub timeout: Duration,
}

impl ModelSettings {
    /// Resolve model settings.
    ///
    /// - API key: `TASKDRAFT_API_KEY` env > `GEMINI_API_KEY` env > `model.api_key` > error
    /// - Model: `cli_model` > `TASKDRAFT_MODEL` env > `model.model` > `GeminiConfig::DEFAULT_MODEL`
    /// - Base URL: `model.base_url` > `GeminiConfig::DEFAULT_BASE_URL`
    /// - Timeout: `model.timeout_secs` > `TaskDrafter::DEFAULT_TIMEOUT`
    pub fn resolve(cli_model: Option<&str>) -> Result<Self> {
        let file_config = load_config().ok();
        let section = file_config.as_ref().map(|c| &c.model);

        let api_key = API_KEY_VARS
            .iter()
            .find_map(|var| non_empty_env(var))
            .or_else(|| section.and_then(|s| s.api_key.clone()))
            .with_context(|| {
                format!(
                    "model API key not found; set {} or {}, or run `taskdraft init --api-key <KEY>`",
                    API_KEY_VARS[0], API_KEY_VARS[1]
                )
            })?;

        let model = if let Some(model) = cli_model {
            model.to_string()
        } else if let Some(model) = non_empty_env(MODEL_VAR) {
            model
        } else if let Some(model) = section.and_then(|s| s.model.clone()) {
            model
        } else {
            GeminiConfig::DEFAULT_MODEL.to_string()
        };

        let mut gemini = GeminiConfig::new(api_key);
        gemini.model = model;
        if let Some(base_url) = section.and_then(|s| s.base_url.clone()) {
            gemini.base_url = base_url;
        }

        let timeout = match section.and_then(|s| s.timeout_secs) {
            Some(0) => bail!("model.timeout_secs must be greater than zero"),
            Some(secs) => Duration::from_secs(secs),
            None => TaskDrafter::DEFAULT_TIMEOUT,
        };

        Ok(Self { gemini, timeout })
    }

    /// Build a drafter backed by the Gemini client.
    pub fn drafter(&self) -> Result<TaskDrafter> {
        let client = GeminiClient::new(self.gemini.clone())?;
        Ok(TaskDrafter::new(Arc::new(client)).with_timeout(self.timeout))
    }
}

/// Resolve the session secret: `TASKDRAFT_SESSION_SECRET` env > `auth.session_secret` > error.
pub fn resolve_session_config() -> Result<SessionConfig> {
    if let Some(secret_hex) = non_empty_env(SESSION_SECRET_VAR) {
        return SessionConfig::from_hex(&secret_hex)
            .with_context(|| format!("{SESSION_SECRET_VAR} env var is not valid hex"));
    }
    match load_config() {
        Ok(cfg) => SessionConfig::from_hex(&cfg.auth.session_secret)
            .context("invalid hex in config file session_secret"),
        Err(_) => bail!(
            "session secret not found; set {SESSION_SECRET_VAR} or run `taskdraft init` to create a config file"
        ),
    }
}

fn non_empty_env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

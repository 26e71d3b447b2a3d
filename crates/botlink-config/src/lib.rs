//! Shared configuration for botlink consumers.
//!
//! TOML profiles merged with `BOTLINK_*` environment variables, token
//! resolution (env var, then plaintext), and translation to
//! `botlink_core::SessionConfig`. The CLI layers its flag overrides on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use botlink_core::{ClientConfig, SessionConfig, SubmitPolicy, SyncConfig};
use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Overrides the config file location when set.
pub const CONFIG_PATH_ENV: &str = "BOTLINK_CONFIG";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{profile}' not found")]
    UnknownProfile { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named on the command line.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named device profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Look up `name`, or the default profile when `name` is `None`.
    pub fn profile<'a>(
        &'a self,
        name: Option<&'a str>,
    ) -> Result<(&'a str, &'a Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get(name)
            .map(|p| (name, p))
            .ok_or_else(|| ConfigError::UnknownProfile {
                profile: name.into(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Defaults {
    /// Output format: "plain" or "json".
    #[serde(default = "default_output")]
    pub output: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Prefer the event stream over polling.
    #[serde(default = "default_push")]
    pub push: bool,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            timeout: default_timeout(),
            push: default_push(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_output() -> String {
    "plain".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_push() -> bool {
    true
}
fn default_poll_interval_ms() -> u64 {
    500
}

/// A named device profile.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Profile {
    /// Device API root (e.g., "http://robot.local:8000").
    pub url: String,

    /// Bearer token (plaintext; prefer `token_env`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Environment variable holding the bearer token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_env: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Override `defaults.push`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_submit_attempts: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_submit_wait_secs: Option<u64>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path: `BOTLINK_CONFIG`, then platform conventions.
pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }
    ProjectDirs::from("com", "botlink", "botlink").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("botlink");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load Config from `path` + environment. A missing file yields defaults.
///
/// Nested keys use a double underscore, e.g.
/// `BOTLINK_PROFILES__LAB__URL=http://10.0.0.7:8000`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("BOTLINK_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist or is invalid.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Token resolution (without CLI flags) ────────────────────────────

/// Resolve the bearer token: `token_env` variable, then plaintext.
/// `None` means the device is unauthenticated.
pub fn resolve_token(profile: &Profile) -> Option<SecretString> {
    // 1. Profile's token_env → env var lookup
    if let Some(ref env_name) = profile.token_env {
        if let Ok(val) = std::env::var(env_name) {
            return Some(SecretString::from(val));
        }
    }

    // 2. Plaintext in config
    profile.token.clone().map(SecretString::from)
}

// ── Translation ─────────────────────────────────────────────────────

pub fn parse_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::Validation {
        field: "url".into(),
        reason: format!("'{raw}': {e}"),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::Validation {
            field: "url".into(),
            reason: format!("unsupported scheme '{other}', expected http or https"),
        }),
    }
}

/// Build a `SessionConfig` from a profile. No CLI flag overrides.
pub fn profile_to_session_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<SessionConfig, ConfigError> {
    let mut client = ClientConfig::new(parse_url(&profile.url)?);
    client.token = resolve_token(profile);
    client.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));

    let poll_interval_ms = profile
        .poll_interval_ms
        .unwrap_or(defaults.poll_interval_ms);
    if poll_interval_ms == 0 {
        return Err(ConfigError::Validation {
            field: "poll_interval_ms".into(),
            reason: "must be greater than zero".into(),
        });
    }
    let sync = SyncConfig {
        push_enabled: profile.push.unwrap_or(defaults.push),
        poll_interval: Duration::from_millis(poll_interval_ms),
        ..SyncConfig::default()
    };

    let mut submit = SubmitPolicy::default();
    if let Some(attempts) = profile.max_submit_attempts {
        if attempts == 0 {
            return Err(ConfigError::Validation {
                field: "max_submit_attempts".into(),
                reason: "must be at least 1".into(),
            });
        }
        submit.max_attempts = attempts;
    }
    if let Some(secs) = profile.max_submit_wait_secs {
        submit.max_wait = Duration::from_secs(secs);
    }

    Ok(SessionConfig {
        client,
        sync,
        submit,
    })
}

//! Configuration for the Karl humidifier bridge.
//!
//! TOML device list, local-key resolution (env + keyring + plaintext),
//! and translation to `karl_core::{DeviceConfig, SessionConfig}`. The CLI
//! adds flag-aware wrappers on top.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use karl_core::{DeviceConfig, SessionConfig};

/// Keyring service name for stored local keys.
pub const KEYRING_SERVICE: &str = "karl";

/// Length of a device local key.
pub const LOCAL_KEY_LEN: usize = 16;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no local key configured for device '{device}'")]
    NoLocalKey { device: String },

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
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Wait between a link loss and the next discovery, e.g. `"5s"`.
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay: String,

    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub devices: Vec<DeviceEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reconnect_delay: default_reconnect_delay(),
            defaults: Defaults::default(),
            devices: Vec::new(),
        }
    }
}

/// Fallbacks for CLI flags that were not given on the command line.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
        }
    }
}

fn default_reconnect_delay() -> String {
    "5s".into()
}
fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}

/// One configured appliance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeviceEntry {
    /// Name shown by the host.
    pub name: String,

    /// Device id from the vendor app.
    pub id: String,

    /// Local key (plaintext — prefer keyring or env var).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// Environment variable name containing the local key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_env: Option<String>,
}

/// Where a device's local key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Env,
    Keyring,
    Plaintext,
}

impl fmt::Display for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Env => "env",
            Self::Keyring => "keyring",
            Self::Plaintext => "config",
        })
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "karl", "karl").map_or_else(
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
    p.push("karl");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from `path` + environment.
///
/// `KARL_`-prefixed variables override file values; nested keys use `__`
/// (`KARL_DEFAULTS__OUTPUT=json`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("KARL_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`, creating parent directories.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Validation ──────────────────────────────────────────────────────

impl Config {
    /// Check everything that can be checked without resolving keys.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.reconnect_delay()?;

        let mut seen = HashSet::new();
        for (index, device) in self.devices.iter().enumerate() {
            if device.id.trim().is_empty() {
                return Err(ConfigError::Validation {
                    field: format!("devices[{index}].id"),
                    reason: "must not be empty".into(),
                });
            }
            if device.name.trim().is_empty() {
                return Err(ConfigError::Validation {
                    field: format!("devices[{index}].name"),
                    reason: "must not be empty".into(),
                });
            }
            if !seen.insert(device.id.as_str()) {
                return Err(ConfigError::Validation {
                    field: format!("devices[{index}].id"),
                    reason: format!("duplicate device id '{}'", device.id),
                });
            }
        }
        Ok(())
    }

    /// Parsed reconnect delay. Must be positive.
    pub fn reconnect_delay(&self) -> Result<Duration, ConfigError> {
        let delay = humantime::parse_duration(&self.reconnect_delay).map_err(|e| {
            ConfigError::Validation {
                field: "reconnect_delay".into(),
                reason: format!("'{}': {e}", self.reconnect_delay),
            }
        })?;
        if delay.is_zero() {
            return Err(ConfigError::Validation {
                field: "reconnect_delay".into(),
                reason: "must be greater than zero".into(),
            });
        }
        Ok(delay)
    }

    pub fn session_config(&self) -> Result<SessionConfig, ConfigError> {
        Ok(SessionConfig {
            reconnect_delay: self.reconnect_delay()?,
        })
    }

    /// Validate and resolve every device into a core `DeviceConfig`.
    pub fn device_configs(&self) -> Result<Vec<DeviceConfig>, ConfigError> {
        self.validate()?;
        self.devices.iter().map(device_config).collect()
    }

    pub fn device(&self, name_or_id: &str) -> Option<&DeviceEntry> {
        self.devices
            .iter()
            .find(|d| d.id == name_or_id || d.name.eq_ignore_ascii_case(name_or_id))
    }
}

// ── Local-key resolution ────────────────────────────────────────────

/// Keyring user name under which a device's local key is stored.
pub fn keyring_user(device_id: &str) -> String {
    format!("{device_id}/local-key")
}

/// Resolve a device's local key from the credential chain.
pub fn resolve_local_key(device: &DeviceEntry) -> Result<(SecretString, KeySource), ConfigError> {
    // 1. Device's key_env → env var lookup
    if let Some(ref env_name) = device.key_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok((SecretString::from(val), KeySource::Env));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &keyring_user(&device.id)) {
        if let Ok(secret) = entry.get_password() {
            return Ok((SecretString::from(secret), KeySource::Keyring));
        }
    }

    // 3. Plaintext in config
    if let Some(ref key) = device.key {
        return Ok((SecretString::from(key.clone()), KeySource::Plaintext));
    }

    Err(ConfigError::NoLocalKey {
        device: device.name.clone(),
    })
}

/// Store a device's local key in the system keyring.
pub fn store_local_key(device_id: &str, key: &SecretString) -> Result<(), ConfigError> {
    check_key_len(device_id, key)?;
    keyring::Entry::new(KEYRING_SERVICE, &keyring_user(device_id))
        .and_then(|entry| entry.set_password(key.expose_secret()))
        .map_err(|e| ConfigError::Validation {
            field: "keyring".into(),
            reason: e.to_string(),
        })
}

fn check_key_len(device_id: &str, key: &SecretString) -> Result<(), ConfigError> {
    let len = key.expose_secret().chars().count();
    if len == LOCAL_KEY_LEN {
        Ok(())
    } else {
        Err(ConfigError::Validation {
            field: format!("local key of device '{device_id}'"),
            reason: format!("expected {LOCAL_KEY_LEN} characters, got {len}"),
        })
    }
}

/// Build a core `DeviceConfig` from a TOML entry.
pub fn device_config(device: &DeviceEntry) -> Result<DeviceConfig, ConfigError> {
    let (key, _) = resolve_local_key(device)?;
    check_key_len(&device.id, &key)?;
    Ok(DeviceConfig::new(device.id.clone(), device.name.clone(), key))
}

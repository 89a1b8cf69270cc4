//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use karl_config::ConfigError;
use karl_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Device '{device}' is not reachable: {reason}")]
    #[diagnostic(
        code(karl::connection_failed),
        help(
            "The session keeps retrying in the background.\n\
             Run with -v to follow the reconnect attempts."
        )
    )]
    ConnectionFailed { device: String, reason: String },

    // ── Credentials ──────────────────────────────────────────────────
    #[error("No local key configured for device '{device}'")]
    #[diagnostic(
        code(karl::no_local_key),
        help(
            "Store one with: karl config set-key {device}\n\
             Or set `key_env` / `key` for the device in the config file."
        )
    )]
    NoLocalKey { device: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(karl::not_found),
        help("Run: karl {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("{resource_type} '{identifier}' already exists")]
    #[diagnostic(code(karl::conflict), help("Pass --force to overwrite it."))]
    Conflict {
        resource_type: String,
        identifier: String,
    },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(karl::validation))]
    Validation { field: String, reason: String },

    // ── Session ──────────────────────────────────────────────────────
    #[error("Session error: {message}")]
    #[diagnostic(code(karl::session))]
    Session { message: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(
        code(karl::config),
        help("Check the config file, or create one with: karl config init")
    )]
    Config(Box<figment::Error>),

    // ── IO ───────────────────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::NoLocalKey { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Conflict { .. } => exit_code::CONFLICT,
            Self::Validation { .. } => exit_code::USAGE,
            Self::Session { .. } | Self::Config(_) | Self::Io(_) => exit_code::GENERAL,
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoLocalKey { device } => CliError::NoLocalKey { device },
            ConfigError::Serialization(e) => CliError::Validation {
                field: "config".into(),
                reason: format!("failed to serialize config: {e}"),
            },
            ConfigError::Figment(e) => CliError::Config(e),
            ConfigError::Io(e) => CliError::Io(e),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::DeviceUnreachable { device_id, reason } => CliError::ConnectionFailed {
                device: device_id,
                reason,
            },

            CoreError::SessionClosed { device_id } => CliError::ConnectionFailed {
                device: device_id,
                reason: "session closed".into(),
            },

            CoreError::UnmappedValue {
                characteristic,
                value,
            } => {
                let valid = characteristic
                    .props()
                    .valid_values
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                CliError::Validation {
                    field: characteristic.to_string(),
                    reason: format!("{value} has no device value (expected one of: {valid})"),
                }
            }

            CoreError::ReadOnly { characteristic } => CliError::Validation {
                field: characteristic.to_string(),
                reason: "read-only".into(),
            },

            CoreError::AccessoryNotFound { identifier } => CliError::NotFound {
                resource_type: "accessory".into(),
                identifier,
                list_command: "devices".into(),
            },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::CommandRejected { message } | CoreError::Internal(message) => {
                CliError::Session { message }
            }
        }
    }
}

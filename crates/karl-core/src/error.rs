// ── Core error types ──
//
// User-facing errors from karl-core. Transport failures arrive as
// `karl_api::Error` and are translated by the `From` impl below, so
// consumers only ever match on `CoreError`.

use thiserror::Error;

use crate::model::Characteristic;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Device {device_id} is unreachable: {reason}")]
    DeviceUnreachable { device_id: String, reason: String },

    #[error("Session for device {device_id} is closed")]
    SessionClosed { device_id: String },

    // ── Translation errors ───────────────────────────────────────────
    #[error("No raw value for {characteristic} = {value}")]
    UnmappedValue {
        characteristic: Characteristic,
        value: u8,
    },

    #[error("{characteristic} is read-only")]
    ReadOnly { characteristic: Characteristic },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Command rejected by device: {message}")]
    CommandRejected { message: String },

    #[error("Accessory not found: {identifier}")]
    AccessoryNotFound { identifier: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<karl_api::Error> for CoreError {
    fn from(err: karl_api::Error) -> Self {
        match err {
            karl_api::Error::NotFound { id } => CoreError::DeviceUnreachable {
                device_id: id,
                reason: "not found on the local network".into(),
            },
            karl_api::Error::DiscoveryTimeout { id, timeout_secs } => {
                CoreError::DeviceUnreachable {
                    device_id: id,
                    reason: format!("discovery timed out after {timeout_secs}s"),
                }
            }
            karl_api::Error::Connect { id, reason } => CoreError::DeviceUnreachable {
                device_id: id,
                reason,
            },
            karl_api::Error::NotConnected { id } => CoreError::DeviceUnreachable {
                device_id: id,
                reason: "no live link".into(),
            },
            karl_api::Error::Closed => CoreError::Internal("transport closed".into()),
            karl_api::Error::Send { dp, reason } => CoreError::CommandRejected {
                message: format!("data point {dp}: {reason}"),
            },
            karl_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}

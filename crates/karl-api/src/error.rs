use thiserror::Error;

/// Top-level error type for the `karl-api` crate.
///
/// Covers every failure mode a transport can report: discovery, link
/// establishment, command delivery, and payload decoding.
/// `karl-core` maps these into session-level diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Discovery ───────────────────────────────────────────────────
    /// The device did not answer the local-network discovery broadcast.
    #[error("Device {id} not found on the local network")]
    NotFound { id: String },

    /// Discovery gave up before the device answered.
    #[error("Discovery of device {id} timed out after {timeout_secs}s")]
    DiscoveryTimeout { id: String, timeout_secs: u64 },

    // ── Link ────────────────────────────────────────────────────────
    /// TCP connect or session-key negotiation failed.
    #[error("Connection to device {id} failed: {reason}")]
    Connect { id: String, reason: String },

    /// A command was issued while no link is up.
    #[error("Device {id} is not connected")]
    NotConnected { id: String },

    /// The transport has shut down and will not deliver more events.
    #[error("Transport closed")]
    Closed,

    // ── Commands ────────────────────────────────────────────────────
    /// The device refused or failed to acknowledge a data-point write.
    #[error("Write to data point {dp} failed: {reason}")]
    Send { dp: u16, reason: String },

    // ── Data ────────────────────────────────────────────────────────
    /// A state report could not be decoded, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if retrying the link is likely to help.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::DiscoveryTimeout { .. }
                | Self::Connect { .. }
                | Self::NotConnected { .. }
        )
    }
}

// ── Runtime session configuration ──
//
// These types describe *which* appliances to bridge and how to supervise
// them. They carry the local key but never touch disk; karl-config builds
// them from the TOML file and hands them in.

use std::time::Duration;

use karl_api::ApplianceIdentity;
use secrecy::SecretString;

/// Delay before re-entering discovery after the link drops.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Supervision tuning shared by every session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Fixed wait between a link loss and the next discovery attempt.
    pub reconnect_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

/// One configured appliance.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub id: String,
    /// Name shown by the host.
    pub name: String,
    pub local_key: SecretString,
}

impl DeviceConfig {
    pub fn new(id: impl Into<String>, name: impl Into<String>, local_key: SecretString) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            local_key,
        }
    }

    pub fn identity(&self) -> ApplianceIdentity {
        ApplianceIdentity::new(self.id.clone(), self.local_key.clone())
    }
}

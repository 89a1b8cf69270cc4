// ── Transport capability ──
//
// The seam between the bridge and the encrypted local protocol. A transport
// owns one link to one appliance: it finds the device, negotiates the
// session, writes data points, and publishes lifecycle and state events on a
// broadcast channel.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use tokio::sync::broadcast;

use crate::dps::{DpsPayload, DpsValue, ReportKind};
use crate::error::Error;

// ── ApplianceIdentity ────────────────────────────────────────────────

/// Who we are talking to: the device id and its local encryption key.
///
/// Immutable for the lifetime of a session. The key never appears in
/// `Debug` output.
#[derive(Clone)]
pub struct ApplianceIdentity {
    pub id: String,
    pub local_key: SecretString,
}

impl ApplianceIdentity {
    pub fn new(id: impl Into<String>, local_key: SecretString) -> Self {
        Self {
            id: id.into(),
            local_key,
        }
    }
}

impl fmt::Debug for ApplianceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplianceIdentity")
            .field("id", &self.id)
            .field("local_key", &"****")
            .finish()
    }
}

// ── TransportEvent ───────────────────────────────────────────────────

/// Events a transport publishes to its subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The link is up and the device accepts commands.
    Connected,
    /// The link dropped (socket closed, heartbeat missed, explicit disconnect).
    Disconnected,
    /// A non-fatal transport problem. Does not imply the link is down.
    Error(String),
    /// The device reported data-point values.
    StateReport {
        kind: ReportKind,
        payload: DpsPayload,
    },
}

// ── Transport ────────────────────────────────────────────────────────

/// One link to one appliance.
///
/// Implementations must publish `Connected` once `connect` succeeds and
/// `Disconnected` whenever an established link goes away. Subscribers that
/// exist before `connect` is called see every event of that cycle.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Identity of the appliance behind this transport.
    fn identity(&self) -> &ApplianceIdentity;

    /// Locate the device on the local network.
    async fn discover(&self) -> Result<(), Error>;

    /// Open the encrypted session with a previously discovered device.
    async fn connect(&self) -> Result<(), Error>;

    /// Close the link. Idempotent.
    async fn disconnect(&self);

    /// Write one data point.
    async fn send(&self, dp: u16, value: DpsValue) -> Result<(), Error>;

    /// Whether the link is currently up, independent of any event stream.
    fn is_connected(&self) -> bool;

    /// Subscribe to lifecycle and state events.
    fn subscribe(&self) -> broadcast::Receiver<TransportEvent>;
}

/// Opens a transport for a configured appliance.
pub trait TransportFactory: Send + Sync {
    fn open(&self, identity: &ApplianceIdentity) -> Arc<dyn Transport>;
}

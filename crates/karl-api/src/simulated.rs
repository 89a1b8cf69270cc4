//! In-memory appliance behind the [`Transport`] trait.
//!
//! [`SimulatedTransport`] behaves like a well-mannered device on a perfect
//! network: `connect` publishes `Connected` followed by a timestamped
//! full-state `Refresh`, every accepted write is echoed back as a `Data` report, and the
//! link only drops when asked to. Tests use the knobs ([`drop_link`],
//! [`set_reachable`], [`inject_error`], [`push_report`]) and the call
//! counters to drive and observe a session.
//!
//! [`drop_link`]: SimulatedTransport::drop_link
//! [`set_reachable`]: SimulatedTransport::set_reachable
//! [`inject_error`]: SimulatedTransport::inject_error
//! [`push_report`]: SimulatedTransport::push_report

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::broadcast;

use crate::dps::{DpsPayload, DpsValue, ReportKind};
use crate::error::Error;
use crate::transport::{ApplianceIdentity, Transport, TransportEvent, TransportFactory};

const EVENT_CHANNEL_CAPACITY: usize = 64;

// ── SimulatedTransport ───────────────────────────────────────────────

/// Cheaply cloneable handle to one simulated appliance.
#[derive(Clone)]
pub struct SimulatedTransport {
    inner: Arc<SimInner>,
}

struct SimInner {
    identity: ApplianceIdentity,
    state: Mutex<SimState>,
    event_tx: broadcast::Sender<TransportEvent>,
    discover_calls: AtomicU32,
    connect_calls: AtomicU32,
}

struct SimState {
    dps: BTreeMap<String, DpsValue>,
    connected: bool,
    reachable: bool,
    sent: Vec<(u16, DpsValue)>,
}

impl SimulatedTransport {
    /// A reachable appliance with an empty data-point table.
    pub fn new(identity: ApplianceIdentity) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(SimInner {
                identity,
                state: Mutex::new(SimState {
                    dps: BTreeMap::new(),
                    connected: false,
                    reachable: true,
                    sent: Vec::new(),
                }),
                event_tx,
                discover_calls: AtomicU32::new(0),
                connect_calls: AtomicU32::new(0),
            }),
        }
    }

    /// Seed the data-point table reported on connect.
    pub fn with_state(self, initial: &DpsPayload) -> Self {
        self.state()
            .dps
            .extend(initial.dps.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: TransportEvent) {
        // No subscribers is fine -- nobody is listening yet.
        let _ = self.inner.event_tx.send(event);
    }

    // ── Knobs ────────────────────────────────────────────────────

    /// Drop an established link, publishing `Disconnected`.
    /// No-op when already disconnected.
    pub fn drop_link(&self) {
        let was_connected = std::mem::replace(&mut self.state().connected, false);
        if was_connected {
            tracing::debug!(device_id = %self.inner.identity.id, "simulated link dropped");
            self.publish(TransportEvent::Disconnected);
        }
    }

    /// Publish `Disconnected` without touching the link, as a flapping
    /// socket does when it reports the same loss twice.
    pub fn signal_disconnect(&self) {
        self.publish(TransportEvent::Disconnected);
    }

    /// Make discovery and connect fail (`false`) or succeed (`true`).
    pub fn set_reachable(&self, reachable: bool) {
        self.state().reachable = reachable;
    }

    /// Publish a transport `Error` event without touching the link.
    pub fn inject_error(&self, detail: impl Into<String>) {
        self.publish(TransportEvent::Error(detail.into()));
    }

    /// Publish an arbitrary state report, as if the device sent it.
    pub fn push_report(&self, kind: ReportKind, payload: DpsPayload) {
        self.state()
            .dps
            .extend(payload.dps.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.publish(TransportEvent::StateReport { kind, payload });
    }

    // ── Observation ──────────────────────────────────────────────

    pub fn discover_count(&self) -> u32 {
        self.inner.discover_calls.load(Ordering::SeqCst)
    }

    pub fn connect_count(&self) -> u32 {
        self.inner.connect_calls.load(Ordering::SeqCst)
    }

    /// Every write the appliance accepted, in order.
    pub fn sent(&self) -> Vec<(u16, DpsValue)> {
        self.state().sent.clone()
    }

    /// Current value of a data point.
    pub fn value(&self, key: &str) -> Option<DpsValue> {
        self.state().dps.get(key).cloned()
    }

    /// Number of live event subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.event_tx.receiver_count()
    }
}

#[async_trait]
impl Transport for SimulatedTransport {
    fn identity(&self) -> &ApplianceIdentity {
        &self.inner.identity
    }

    async fn discover(&self) -> Result<(), Error> {
        self.inner.discover_calls.fetch_add(1, Ordering::SeqCst);
        if self.state().reachable {
            Ok(())
        } else {
            Err(Error::NotFound {
                id: self.inner.identity.id.clone(),
            })
        }
    }

    async fn connect(&self) -> Result<(), Error> {
        self.inner.connect_calls.fetch_add(1, Ordering::SeqCst);

        let snapshot = {
            let mut state = self.state();
            if !state.reachable {
                return Err(Error::Connect {
                    id: self.inner.identity.id.clone(),
                    reason: "no route to device".into(),
                });
            }
            state.connected = true;
            state.dps.clone()
        };

        self.publish(TransportEvent::Connected);
        self.publish(TransportEvent::StateReport {
            kind: ReportKind::Refresh,
            payload: DpsPayload {
                dps: snapshot,
                t: Some(Utc::now().timestamp()),
            },
        });
        Ok(())
    }

    async fn disconnect(&self) {
        self.drop_link();
    }

    async fn send(&self, dp: u16, value: DpsValue) -> Result<(), Error> {
        let key = dp.to_string();
        {
            let mut state = self.state();
            if !state.connected {
                return Err(Error::NotConnected {
                    id: self.inner.identity.id.clone(),
                });
            }
            state.sent.push((dp, value.clone()));
            state.dps.insert(key.clone(), value.clone());
        }

        self.publish(TransportEvent::StateReport {
            kind: ReportKind::Data,
            payload: DpsPayload::single(key, value),
        });
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state().connected
    }

    fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.inner.event_tx.subscribe()
    }
}

// ── SimulatedFactory ─────────────────────────────────────────────────

/// Hands out one [`SimulatedTransport`] per identity, seeded with the same
/// initial table, and keeps the handles for later inspection.
#[derive(Default)]
pub struct SimulatedFactory {
    initial: DpsPayload,
    opened: Mutex<Vec<SimulatedTransport>>,
}

impl SimulatedFactory {
    pub fn new(initial: DpsPayload) -> Self {
        Self {
            initial,
            opened: Mutex::new(Vec::new()),
        }
    }

    /// Every transport opened so far.
    pub fn transports(&self) -> Vec<SimulatedTransport> {
        self.opened
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The transport opened for a given device id.
    pub fn transport(&self, device_id: &str) -> Option<SimulatedTransport> {
        self.transports()
            .into_iter()
            .find(|t| t.identity().id == device_id)
    }
}

impl TransportFactory for SimulatedFactory {
    fn open(&self, identity: &ApplianceIdentity) -> Arc<dyn Transport> {
        let transport = SimulatedTransport::new(identity.clone()).with_state(&self.initial);
        self.opened
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(transport.clone());
        Arc::new(transport)
    }
}

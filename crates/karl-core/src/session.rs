// ── Device session ──
//
// One logical connection to one appliance. A supervisor task owns the
// transport subscription and runs discover → connect → monitor → retry,
// translating state reports into characteristic updates as they arrive.
// The public handle is cheap to clone and is what the host's on-set hooks
// call into.

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use karl_api::{DpsPayload, DpsValue, ReportKind, Transport, TransportEvent};
use strum::Display;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::SessionConfig;
use crate::error::CoreError;
use crate::model::{Characteristic, DataPoint};
use crate::translate;

// ── SessionState ─────────────────────────────────────────────────

/// Lifecycle state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    /// Constructed, supervisor not yet running.
    Idle,
    /// Discovery or connect in flight.
    Discovering,
    Connected,
    /// Link lost; a retry is scheduled.
    Disconnected,
    /// `dispose()` completed. Terminal.
    Disposed,
}

// ── CharacteristicSink ───────────────────────────────────────────

/// Receives translated inbound values, one call per characteristic.
pub trait CharacteristicSink: Send + Sync {
    fn update(&self, characteristic: Characteristic, value: u8);
}

/// A raw write waiting for the supervisor.
#[derive(Debug)]
struct SessionCommand {
    characteristic: Characteristic,
    data_point: DataPoint,
    value: DpsValue,
}

// ── DeviceSession ────────────────────────────────────────────────

/// Handle to a running session.
///
/// Cheaply cloneable via `Arc<SessionInner>`. Setters translate
/// synchronously and enqueue the raw write; they never wait for the device.
#[derive(Clone)]
pub struct DeviceSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    device_id: String,
    sink: Arc<dyn CharacteristicSink>,
    state: watch::Receiver<SessionState>,
    command_tx: mpsc::UnboundedSender<SessionCommand>,
    cancel: CancellationToken,
    task_handle: Mutex<Option<JoinHandle<()>>>,
    reconnect_attempts: Arc<AtomicU64>,
}

impl DeviceSession {
    /// Start supervising `transport`. Discovery begins immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        transport: Arc<dyn Transport>,
        sink: Arc<dyn CharacteristicSink>,
        config: &SessionConfig,
    ) -> Self {
        let device_id = transport.identity().id.clone();
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let reconnect_attempts = Arc::new(AtomicU64::new(0));

        // One subscription for the session's whole life, taken before the first connect.
        let events = transport.subscribe();

        let supervisor = Supervisor {
            device_id: device_id.clone(),
            transport,
            sink: Arc::clone(&sink),
            state: state_tx,
            reconnect_delay: config.reconnect_delay,
            reconnect_attempts: Arc::clone(&reconnect_attempts),
            retry: None,
        };
        let handle = tokio::spawn(supervisor.run(events, command_rx, cancel.clone()));

        Self {
            inner: Arc::new(SessionInner {
                device_id,
                sink,
                state: state_rx,
                command_tx,
                cancel,
                task_handle: Mutex::new(Some(handle)),
                reconnect_attempts,
            }),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.inner.device_id
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.inner.state.clone()
    }

    /// Number of retries fired since the session started.
    pub fn reconnect_attempts(&self) -> u64 {
        self.inner.reconnect_attempts.load(Ordering::SeqCst)
    }

    // ── Setters ──────────────────────────────────────────────────

    /// Translate `value` and enqueue the write for `characteristic`.
    ///
    /// Nothing is sent when the value has no raw counterpart.
    pub fn set(&self, characteristic: Characteristic, value: u8) -> Result<(), CoreError> {
        let data_point = match characteristic.data_point() {
            Some(dp) if characteristic.is_writable() => dp,
            _ => return Err(CoreError::ReadOnly { characteristic }),
        };

        let Some(raw) = translate::to_raw(characteristic, value) else {
            warn!(
                device_id = %self.inner.device_id,
                %characteristic,
                value,
                "value has no raw mapping, command not sent"
            );
            return Err(CoreError::UnmappedValue {
                characteristic,
                value,
            });
        };

        info!(
            device_id = %self.inner.device_id,
            %characteristic,
            value,
            code = data_point.code(),
            raw = %raw,
            "setting"
        );
        self.inner
            .command_tx
            .send(SessionCommand {
                characteristic,
                data_point,
                value: raw,
            })
            .map_err(|_| CoreError::SessionClosed {
                device_id: self.inner.device_id.clone(),
            })
    }

    pub fn set_active_state(&self, value: u8) -> Result<(), CoreError> {
        self.set(Characteristic::ActiveState, value)
    }

    pub fn set_target_humidity(&self, value: u8) -> Result<(), CoreError> {
        self.set(Characteristic::TargetHumidity, value)
    }

    pub fn set_operating_mode(&self, value: u8) -> Result<(), CoreError> {
        self.set(Characteristic::OperatingMode, value)
    }

    pub fn set_fan_speed(&self, value: u8) -> Result<(), CoreError> {
        self.set(Characteristic::FanSpeed, value)
    }

    pub fn set_light_level(&self, value: u8) -> Result<(), CoreError> {
        self.set(Characteristic::LightLevel, value)
    }

    /// Translate a report and push every produced value to this session's sink.
    pub fn on_applied_state_report(&self, payload: &DpsPayload) -> usize {
        apply_state_report(&self.inner.device_id, payload, self.inner.sink.as_ref())
    }

    /// Cancel any pending retry, disconnect, and wait for the supervisor to exit.
    pub async fn dispose(&self) {
        self.inner.cancel.cancel();
        let handle = self
            .inner
            .task_handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(device_id = %self.inner.device_id, error = %e, "session supervisor aborted");
            }
        }
    }
}

/// Translate every known data point in `payload` and push the results to `sink`.
///
/// Each data point is handled on its own: unknown codes and unmapped values
/// are skipped without affecting the rest. Returns the number of updates
/// pushed.
pub fn apply_state_report(
    device_id: &str,
    payload: &DpsPayload,
    sink: &dyn CharacteristicSink,
) -> usize {
    let mut updates = 0;
    for (key, raw) in &payload.dps {
        let Some(data_point) = DataPoint::from_key(key) else {
            debug!(device_id, key = %key, raw = %raw, "ignoring unknown data point");
            continue;
        };
        for &characteristic in Characteristic::reported_by(data_point) {
            if let Some(value) = translate::to_semantic(characteristic, raw) {
                debug!(device_id, %characteristic, value, raw = %raw, "update");
                sink.update(characteristic, value);
                updates += 1;
            } else {
                debug!(device_id, %characteristic, raw = %raw, "dropping unmapped raw value");
            }
        }
    }
    updates
}

// ── Supervisor ───────────────────────────────────────────────────

struct Supervisor {
    device_id: String,
    transport: Arc<dyn Transport>,
    sink: Arc<dyn CharacteristicSink>,
    state: watch::Sender<SessionState>,
    reconnect_delay: Duration,
    reconnect_attempts: Arc<AtomicU64>,
    /// At most one pending retry.
    retry: Option<Pin<Box<Sleep>>>,
}

impl Supervisor {
    async fn run(
        mut self,
        mut events: broadcast::Receiver<TransportEvent>,
        mut commands: mpsc::UnboundedReceiver<SessionCommand>,
        cancel: CancellationToken,
    ) {
        self.establish(&cancel).await;

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = wait_retry(&mut self.retry) => {
                    self.retry = None;
                    let attempt = self.reconnect_attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    info!(device_id = %self.device_id, attempt, "reconnecting");
                    self.establish(&cancel).await;
                }
                event = events.recv() => match event {
                    Ok(event) => self.handle_event(event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(device_id = %self.device_id, skipped, "event subscriber lagged");
                        self.resync_link();
                    }
                    Err(RecvError::Closed) => {
                        warn!(device_id = %self.device_id, "transport event stream closed");
                        break;
                    }
                },
                command = commands.recv() => match command {
                    Some(command) => tokio::select! {
                        biased;
                        () = cancel.cancelled() => break,
                        () = self.dispatch(command) => {}
                    },
                    None => {
                        debug!(device_id = %self.device_id, "all session handles dropped");
                        break;
                    }
                },
            }
        }

        self.retry = None;
        self.transport.disconnect().await;
        self.state.send_replace(SessionState::Disposed);
        info!(device_id = %self.device_id, "session disposed");
    }

    /// Discover and connect. A failure counts as a link loss.
    async fn establish(&mut self, cancel: &CancellationToken) {
        self.state.send_replace(SessionState::Discovering);
        debug!(device_id = %self.device_id, "discovering device");

        let transport = Arc::clone(&self.transport);
        let attempt = async move {
            transport.discover().await?;
            transport.connect().await
        };

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            result = attempt => result,
        };

        if let Err(e) = result {
            if e.is_transient() {
                warn!(device_id = %self.device_id, error = %e, "device not reachable");
            } else {
                error!(device_id = %self.device_id, error = %e, "connection attempt failed");
            }
            self.state.send_replace(SessionState::Disconnected);
            self.schedule_retry();
        }
    }

    fn link_lost(&mut self) {
        warn!(
            device_id = %self.device_id,
            "disconnected, retrying in {:?}",
            self.reconnect_delay
        );
        self.state.send_replace(SessionState::Disconnected);
        self.schedule_retry();
    }

    /// Skipped events may have carried a link change; ask the transport.
    fn resync_link(&mut self) {
        let current = *self.state.borrow();
        if self.transport.is_connected() {
            if current != SessionState::Connected {
                info!(device_id = %self.device_id, "connected");
                self.retry = None;
                self.state.send_replace(SessionState::Connected);
            }
        } else if self.retry.is_none() {
            self.link_lost();
        }
    }

    fn schedule_retry(&mut self) {
        if self.retry.is_some() {
            debug!(device_id = %self.device_id, "retry already pending");
            return;
        }
        self.retry = Some(Box::pin(tokio::time::sleep(self.reconnect_delay)));
    }

    fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                info!(device_id = %self.device_id, "connected");
                self.state.send_replace(SessionState::Connected);
            }
            TransportEvent::Disconnected => self.link_lost(),
            TransportEvent::Error(detail) => {
                error!(device_id = %self.device_id, detail = %detail, "transport error");
            }
            TransportEvent::StateReport { kind, payload } => {
                let label = match kind {
                    ReportKind::Refresh => "refresh",
                    ReportKind::Data => "data",
                };
                debug!(
                    device_id = %self.device_id,
                    kind = label,
                    dps = payload.len(),
                    device_time = ?payload.timestamp(),
                    "state report"
                );
                apply_state_report(&self.device_id, &payload, self.sink.as_ref());
            }
        }
    }

    async fn dispatch(&self, command: SessionCommand) {
        let code = command.data_point.code();
        match self.transport.send(code, command.value).await {
            Ok(()) => {
                debug!(device_id = %self.device_id, characteristic = %command.characteristic, code, "command sent");
            }
            Err(e) if e.is_transient() => {
                warn!(device_id = %self.device_id, characteristic = %command.characteristic, code, error = %e, "link down, command dropped");
            }
            Err(e) => {
                error!(device_id = %self.device_id, characteristic = %command.characteristic, code, error = %e, "command not delivered");
            }
        }
    }
}

/// Resolves when the pending retry fires; pends forever when none is armed.
async fn wait_retry(retry: &mut Option<Pin<Box<Sleep>>>) {
    match retry.as_mut() {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

//! `karl simulate`: the full bridge wired to in-memory appliances.
//!
//! Every selected device gets a `SimulatedTransport` seeded with a typical
//! Karl state table. The command plays the host's part: it applies the
//! requested writes through the accessory's on-set hooks, replays any
//! device reports given as JSON, optionally drops the links, and prints every characteristic update the host received.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tabled::Tabled;
use tracing::{debug, info};
use uuid::Uuid;

use karl_api::{DpsPayload, ReportKind, SimulatedFactory};
use karl_core::{
    AccessoryHost, AccessoryInfo, Characteristic, CharacteristicProps, DeviceSession,
    HumidifierService, Platform, PlatformAccessory, SessionState, SetHandler,
};

use crate::cli::{GlobalOpts, SimulateArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

use super::util;

/// Extra time allowed on top of the reconnect delay for a link to come up.
const CONNECT_GRACE: Duration = Duration::from_secs(5);

/// Data points a freshly powered Karl reports: off, 45 % measured, tank
/// full, filter at 80 %, half light, fan level 2, auto mode, target 50 %.
fn karl_table() -> DpsPayload {
    let mut table = DpsPayload::default();
    table.insert("1", false);
    table.insert("14", 45_i64);
    table.insert("22", 0_i64);
    table.insert("33", 80_i64);
    table.insert("34", "Half");
    table.insert("101", "level_2");
    table.insert("102", true);
    table.insert("103", "50");
    table
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Update log ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
struct UpdateRecord {
    at: DateTime<Utc>,
    device: String,
    characteristic: Characteristic,
    value: u8,
}

type UpdateLog = Arc<Mutex<Vec<UpdateRecord>>>;

#[derive(Tabled)]
struct UpdateRow {
    #[tabled(rename = "Time")]
    at: String,
    #[tabled(rename = "Device")]
    device: String,
    #[tabled(rename = "Property")]
    characteristic: String,
    #[tabled(rename = "Value")]
    value: u8,
}

impl From<&UpdateRecord> for UpdateRow {
    fn from(r: &UpdateRecord) -> Self {
        Self {
            at: r.at.format("%H:%M:%S%.3f").to_string(),
            device: r.device.clone(),
            characteristic: r.characteristic.to_string(),
            value: r.value,
        }
    }
}

// ── Console host ────────────────────────────────────────────────────

/// Humidifier service that records updates instead of showing them.
struct ConsoleService {
    device: String,
    log: UpdateLog,
    handlers: Mutex<HashMap<Characteristic, SetHandler>>,
}

impl ConsoleService {
    /// Write a characteristic the way the host would after a user action.
    fn write(&self, characteristic: Characteristic, value: u8) -> Result<(), CliError> {
        let handlers = lock(&self.handlers);
        let handler = handlers
            .get(&characteristic)
            .ok_or_else(|| CliError::Validation {
                field: characteristic.to_string(),
                reason: "no write hook registered".into(),
            })?;
        let props = characteristic.props();
        if !props.accepts(value) {
            return Err(CliError::Validation {
                field: characteristic.to_string(),
                reason: describe_allowed(&props),
            });
        }
        info!(device = %self.device, %characteristic, value, "host write");
        handler(value).map_err(CliError::from)
    }
}

/// Describe the values a host control offers for a characteristic.
fn describe_allowed(props: &CharacteristicProps) -> String {
    if props.valid_values.is_empty() {
        format!(
            "must be {}..={} in steps of {}",
            props.min_value, props.max_value, props.min_step
        )
    } else {
        let values: Vec<String> = props.valid_values.iter().map(u8::to_string).collect();
        format!("must be one of {}", values.join(", "))
    }
}

impl HumidifierService for ConsoleService {
    fn set_accessory_info(&self, info: &AccessoryInfo) {
        debug!(
            device = %self.device,
            manufacturer = %info.manufacturer,
            model = %info.model,
            serial = %info.serial_number,
            "accessory information"
        );
    }

    fn set_primary(&self) {}

    fn configure(&self, characteristic: Characteristic, props: &CharacteristicProps) {
        debug!(
            device = %self.device,
            %characteristic,
            min = props.min_value,
            max = props.max_value,
            step = props.min_step,
            "characteristic declared"
        );
    }

    fn on_set(&self, characteristic: Characteristic, handler: SetHandler) {
        lock(&self.handlers).insert(characteristic, handler);
    }

    fn update(&self, characteristic: Characteristic, value: u8) {
        lock(&self.log).push(UpdateRecord {
            at: Utc::now(),
            device: self.device.clone(),
            characteristic,
            value,
        });
    }
}

#[derive(Default)]
struct ConsoleHost {
    log: UpdateLog,
    services: Mutex<HashMap<Uuid, Arc<ConsoleService>>>,
}

impl ConsoleHost {
    fn service(&self, uuid: Uuid) -> Option<Arc<ConsoleService>> {
        lock(&self.services).get(&uuid).cloned()
    }

    fn records(&self) -> Vec<UpdateRecord> {
        lock(&self.log).clone()
    }
}

impl AccessoryHost for ConsoleHost {
    fn register_accessories(&self, accessories: &[PlatformAccessory]) {
        for a in accessories {
            info!(name = %a.display_name, uuid = %a.uuid, "registered accessory");
        }
    }

    fn update_accessories(&self, accessories: &[PlatformAccessory]) {
        for a in accessories {
            debug!(name = %a.display_name, uuid = %a.uuid, "updated accessory");
        }
    }

    fn unregister_accessories(&self, accessories: &[PlatformAccessory]) {
        for a in accessories {
            info!(name = %a.display_name, uuid = %a.uuid, "unregistered accessory");
        }
    }

    fn humidifier_service(&self, accessory: &PlatformAccessory) -> Arc<dyn HumidifierService> {
        lock(&self.services)
            .entry(accessory.uuid)
            .or_insert_with(|| {
                Arc::new(ConsoleService {
                    device: accessory.display_name.clone(),
                    log: Arc::clone(&self.log),
                    handlers: Mutex::new(HashMap::new()),
                })
            })
            .clone()
    }
}

// ── Driving the sessions ────────────────────────────────────────────

/// Wait until `session` is connected with at least `min_attempts` retries behind it.
async fn wait_connected(
    session: &DeviceSession,
    min_attempts: u64,
    timeout: Duration,
) -> Result<(), CliError> {
    let mut rx = session.subscribe_state();
    let reached = tokio::time::timeout(
        timeout,
        rx.wait_for(|s| {
            *s == SessionState::Connected && session.reconnect_attempts() >= min_attempts
        }),
    )
    .await;

    match reached {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(_)) => Err(CliError::ConnectionFailed {
            device: session.device_id().into(),
            reason: "session stopped".into(),
        }),
        Err(_) => Err(CliError::ConnectionFailed {
            device: session.device_id().into(),
            reason: format!(
                "not connected after {}",
                humantime::format_duration(timeout)
            ),
        }),
    }
}

struct Plan<'a> {
    sets: &'a [(Characteristic, u8)],
    reports: &'a [DpsPayload],
    drop_link: bool,
    connect_timeout: Duration,
    settle: Duration,
}

async fn drive(
    platform: &Platform,
    host: &ConsoleHost,
    factory: &SimulatedFactory,
    plan: &Plan<'_>,
) -> Result<(), CliError> {
    let mut wired = Vec::new();
    for accessory in platform.accessories() {
        let session = platform
            .session(accessory.uuid)
            .ok_or_else(|| CliError::Session {
                message: format!("no session for '{}'", accessory.display_name),
            })?;
        wait_connected(&session, 0, plan.connect_timeout).await?;
        wired.push((accessory, session));
    }

    for (accessory, _) in &wired {
        let service = host.service(accessory.uuid).ok_or_else(|| CliError::Session {
            message: format!("no service for '{}'", accessory.display_name),
        })?;
        for &(characteristic, value) in plan.sets {
            service.write(characteristic, value)?;
        }
    }

    for (accessory, _) in &wired {
        if let Some(transport) = factory.transport(&accessory.device_id) {
            for report in plan.reports {
                transport.push_report(ReportKind::Data, report.clone());
            }
        }
    }

    if plan.drop_link {
        let mut pending = Vec::new();
        for (accessory, session) in &wired {
            let before = session.reconnect_attempts();
            if let Some(transport) = factory.transport(&accessory.device_id) {
                info!(device = %accessory.display_name, "dropping link");
                transport.drop_link();
                pending.push((session, before + 1));
            }
        }
        for (session, min_attempts) in pending {
            wait_connected(session, min_attempts, plan.connect_timeout).await?;
        }
    }

    tokio::time::sleep(plan.settle).await;
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: SimulateArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let sets = args
        .sets
        .iter()
        .map(|s| util::parse_assignment(s))
        .collect::<Result<Vec<_>, _>>()?;
    let reports = args
        .reports
        .iter()
        .map(|text| {
            DpsPayload::from_json_str(text).map_err(|e| CliError::Validation {
                field: "--report".into(),
                reason: e.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let settle = util::parse_duration("--settle", &args.settle)?;

    let cfg = config::load(global)?;
    let mut session_config = cfg.session_config()?;
    if let Some(ref delay) = args.reconnect_delay {
        session_config.reconnect_delay = util::parse_duration("--reconnect-delay", delay)?;
        if session_config.reconnect_delay.is_zero() {
            return Err(CliError::Validation {
                field: "--reconnect-delay".into(),
                reason: "must be greater than zero".into(),
            });
        }
    }
    let devices = config::select_devices(&cfg, args.device.as_deref())?;
    let device_count = devices.len();

    let plan = Plan {
        sets: &sets,
        reports: &reports,
        drop_link: args.drop_link,
        connect_timeout: session_config.reconnect_delay + CONNECT_GRACE,
        settle,
    };

    let host = Arc::new(ConsoleHost::default());
    let factory = Arc::new(SimulatedFactory::new(karl_table()));
    let platform = Platform::new(host.clone(), factory.clone(), devices, session_config);
    platform.discover_devices();

    let outcome = drive(&platform, &host, &factory, &plan).await;
    platform.shutdown().await;
    outcome?;

    let records = host.records();
    let out = output::render_list(
        &global.output_format(),
        &records,
        |r| UpdateRow::from(r),
        |r| format!("{} {}={}", r.device, r.characteristic, r.value),
    );
    output::print_output(&out, global.quiet);
    output::print_status(
        &format!("{} updates from {device_count} device(s)", records.len()),
        output::should_color(&global.color_mode()),
        global.quiet,
    );
    Ok(())
}

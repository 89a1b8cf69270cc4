#![allow(clippy::unwrap_used)]
// Integration tests for `Platform` and `HumidifierAccessory` against a
// recording host and simulated appliances.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use uuid::Uuid;

use karl_api::{DpsPayload, DpsValue, SimulatedFactory, Transport};
use karl_core::{
    AccessoryHost, AccessoryInfo, Characteristic, CharacteristicProps, CoreError, DeviceConfig,
    HumidifierService, Platform, PlatformAccessory, SessionConfig, SessionState, SetHandler,
    accessory_uuid,
};

// ── Recording host ──────────────────────────────────────────────────

#[derive(Default)]
struct RecordingService {
    info: Mutex<Option<AccessoryInfo>>,
    primary: AtomicBool,
    props: Mutex<HashMap<Characteristic, CharacteristicProps>>,
    handlers: Mutex<HashMap<Characteristic, SetHandler>>,
    values: Mutex<HashMap<Characteristic, u8>>,
}

impl RecordingService {
    /// Simulate a user writing a characteristic in the host UI.
    fn host_set(&self, characteristic: Characteristic, value: u8) -> Result<(), CoreError> {
        let handlers = self.handlers.lock().unwrap();
        let handler = handlers
            .get(&characteristic)
            .unwrap_or_else(|| panic!("no on-set hook for {characteristic}"));
        handler(value)
    }

    fn value(&self, characteristic: Characteristic) -> Option<u8> {
        self.values.lock().unwrap().get(&characteristic).copied()
    }
}

impl HumidifierService for RecordingService {
    fn set_accessory_info(&self, info: &AccessoryInfo) {
        *self.info.lock().unwrap() = Some(info.clone());
    }

    fn set_primary(&self) {
        self.primary.store(true, Ordering::SeqCst);
    }

    fn configure(&self, characteristic: Characteristic, props: &CharacteristicProps) {
        self.props.lock().unwrap().insert(characteristic, *props);
    }

    fn on_set(&self, characteristic: Characteristic, handler: SetHandler) {
        self.handlers.lock().unwrap().insert(characteristic, handler);
    }

    fn update(&self, characteristic: Characteristic, value: u8) {
        self.values.lock().unwrap().insert(characteristic, value);
    }
}

#[derive(Default)]
struct RecordingHost {
    registered: Mutex<Vec<PlatformAccessory>>,
    updated: Mutex<Vec<PlatformAccessory>>,
    unregistered: Mutex<Vec<PlatformAccessory>>,
    services: Mutex<HashMap<Uuid, Arc<RecordingService>>>,
}

impl RecordingHost {
    fn service(&self, uuid: Uuid) -> Arc<RecordingService> {
        self.services.lock().unwrap().get(&uuid).cloned().unwrap()
    }
}

impl AccessoryHost for RecordingHost {
    fn register_accessories(&self, accessories: &[PlatformAccessory]) {
        self.registered.lock().unwrap().extend_from_slice(accessories);
    }

    fn update_accessories(&self, accessories: &[PlatformAccessory]) {
        self.updated.lock().unwrap().extend_from_slice(accessories);
    }

    fn unregister_accessories(&self, accessories: &[PlatformAccessory]) {
        self.unregistered.lock().unwrap().extend_from_slice(accessories);
    }

    fn humidifier_service(&self, accessory: &PlatformAccessory) -> Arc<dyn HumidifierService> {
        self.services
            .lock()
            .unwrap()
            .entry(accessory.uuid)
            .or_default()
            .clone()
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn device(id: &str, name: &str) -> DeviceConfig {
    DeviceConfig::new(id, name, SecretString::from("0123456789abcdef"))
}

struct Fixture {
    host: Arc<RecordingHost>,
    factory: Arc<SimulatedFactory>,
    platform: Platform,
}

fn fixture(devices: Vec<DeviceConfig>) -> Fixture {
    let host = Arc::new(RecordingHost::default());
    let mut table = DpsPayload::single("1", true);
    table.insert("103", "45");
    let factory = Arc::new(SimulatedFactory::new(table));
    let platform = Platform::new(
        host.clone(),
        factory.clone(),
        devices,
        SessionConfig::default(),
    );
    Fixture {
        host,
        factory,
        platform,
    }
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

// ── Discovery ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn new_devices_are_registered_and_wired() {
    let f = fixture(vec![device("bf01", "Bedroom"), device("bf02", "Office")]);

    assert_eq!(f.platform.discover_devices(), 2);
    settle().await;

    let registered = f.host.registered.lock().unwrap().clone();
    assert_eq!(registered.len(), 2);
    assert!(f.host.updated.lock().unwrap().is_empty());

    let uuid = accessory_uuid("bf01");
    let service = f.host.service(uuid);
    assert_eq!(
        service.info.lock().unwrap().clone().unwrap(),
        AccessoryInfo {
            name: "Bedroom".into(),
            manufacturer: "Stadler Form".into(),
            model: "Karl".into(),
            serial_number: uuid.to_string(),
        }
    );
    assert!(service.primary.load(Ordering::SeqCst));

    let props = service.props.lock().unwrap().clone();
    assert_eq!(props.len(), 9);
    assert_eq!(
        props[&Characteristic::TargetHumidity].valid_values,
        &[20, 40, 60, 80, 100]
    );
    assert_eq!(props[&Characteristic::FanSpeed].min_step, 25);
    assert!(!props.contains_key(&Characteristic::LightLevel));

    let mut hooks: Vec<Characteristic> = service.handlers.lock().unwrap().keys().copied().collect();
    hooks.sort();
    assert_eq!(
        hooks,
        vec![
            Characteristic::ActiveState,
            Characteristic::TargetHumidity,
            Characteristic::FanSpeed,
            Characteristic::OperatingMode,
        ]
    );

    // Initial refresh reached the service.
    assert_eq!(service.value(Characteristic::ActiveState), Some(1));
    assert_eq!(service.value(Characteristic::TargetHumidity), Some(40));

    f.platform.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn cached_accessory_is_restored_not_registered() {
    let f = fixture(vec![device("bf01", "Bedroom")]);
    f.platform.configure_accessory(PlatformAccessory {
        uuid: accessory_uuid("bf01"),
        display_name: "Old name".into(),
        device_id: "bf01".into(),
    });

    assert_eq!(f.platform.discover_devices(), 1);

    assert!(f.host.registered.lock().unwrap().is_empty());
    let updated = f.host.updated.lock().unwrap().clone();
    assert_eq!(updated.len(), 1);
    assert_eq!(updated[0].display_name, "Bedroom");
    assert_eq!(f.platform.accessories()[0].display_name, "Bedroom");

    f.platform.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn rediscovery_does_not_wire_twice() {
    let f = fixture(vec![device("bf01", "Bedroom")]);

    assert_eq!(f.platform.discover_devices(), 1);
    assert_eq!(f.platform.discover_devices(), 0);
    assert_eq!(f.factory.transports().len(), 1);

    f.platform.shutdown().await;
}

// ── Host writes ─────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn host_write_reaches_device_and_echoes_back() {
    let f = fixture(vec![device("bf01", "Bedroom")]);
    f.platform.discover_devices();
    settle().await;

    let service = f.host.service(accessory_uuid("bf01"));
    service
        .host_set(Characteristic::TargetHumidity, 100)
        .unwrap();
    settle().await;

    let transport = f.factory.transport("bf01").unwrap();
    assert_eq!(transport.sent(), vec![(103, DpsValue::from("CO"))]);
    assert_eq!(service.value(Characteristic::TargetHumidity), Some(100));

    f.platform.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn host_write_with_unmapped_value_is_rejected() {
    let f = fixture(vec![device("bf01", "Bedroom")]);
    f.platform.discover_devices();
    settle().await;

    let service = f.host.service(accessory_uuid("bf01"));
    let err = service.host_set(Characteristic::FanSpeed, 30).unwrap_err();
    assert!(matches!(err, CoreError::UnmappedValue { .. }));
    settle().await;

    assert!(f.factory.transport("bf01").unwrap().sent().is_empty());

    f.platform.shutdown().await;
}

// ── Removal ─────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn remove_accessory_unregisters_and_disposes() {
    let f = fixture(vec![device("bf01", "Bedroom")]);
    f.platform.discover_devices();
    settle().await;

    let uuid = accessory_uuid("bf01");
    let session = f.platform.session(uuid).unwrap();
    assert_eq!(session.state(), SessionState::Connected);

    f.platform.remove_accessory(uuid).await.unwrap();

    assert_eq!(session.state(), SessionState::Disposed);
    assert_eq!(f.host.unregistered.lock().unwrap().len(), 1);
    assert!(f.platform.session(uuid).is_none());
    assert!(!f.factory.transport("bf01").unwrap().is_connected());

    let err = f.platform.remove_accessory(uuid).await.unwrap_err();
    assert!(matches!(err, CoreError::AccessoryNotFound { .. }));
}

#[tokio::test(start_paused = true)]
async fn shutdown_disposes_every_session() {
    let f = fixture(vec![device("bf01", "Bedroom"), device("bf02", "Office")]);
    f.platform.discover_devices();
    settle().await;

    let sessions: Vec<_> = ["bf01", "bf02"]
        .iter()
        .map(|id| f.platform.session(accessory_uuid(id)).unwrap())
        .collect();

    f.platform.shutdown().await;

    for session in sessions {
        assert_eq!(session.state(), SessionState::Disposed);
    }
    assert!(f.host.unregistered.lock().unwrap().is_empty());
}

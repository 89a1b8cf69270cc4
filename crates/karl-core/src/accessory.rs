// ── Humidifier accessory ──
//
// Glue between one session and the host's humidifier service: declares
// the characteristic constraints, binds the on-set hooks to session
// setters, and routes translated updates back to the service.

use std::sync::Arc;

use karl_api::Transport;
use tracing::debug;
use uuid::Uuid;

use crate::config::{DeviceConfig, SessionConfig};
use crate::error::CoreError;
use crate::model::{Characteristic, CharacteristicProps, HUMIDIFIER_SERVICE};
use crate::session::{CharacteristicSink, DeviceSession};

pub const MANUFACTURER: &str = "Stadler Form";
pub const MODEL: &str = "Karl";

/// Identification shown by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessoryInfo {
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    pub serial_number: String,
}

/// Called by the host when a user writes a characteristic.
pub type SetHandler = Box<dyn Fn(u8) -> Result<(), CoreError> + Send + Sync>;

/// The host-side humidifier service of one accessory.
pub trait HumidifierService: Send + Sync {
    fn set_accessory_info(&self, info: &AccessoryInfo);

    fn set_primary(&self);

    /// Declare value constraints for a characteristic.
    fn configure(&self, characteristic: Characteristic, props: &CharacteristicProps);

    /// Register the write hook for a characteristic.
    fn on_set(&self, characteristic: Characteristic, handler: SetHandler);

    /// Push a new value to the host.
    fn update(&self, characteristic: Characteristic, value: u8);
}

struct ServiceSink(Arc<dyn HumidifierService>);

impl CharacteristicSink for ServiceSink {
    fn update(&self, characteristic: Characteristic, value: u8) {
        self.0.update(characteristic, value);
    }
}

/// One bridged appliance: its service bindings and its session.
pub struct HumidifierAccessory {
    uuid: Uuid,
    name: String,
    session: DeviceSession,
}

impl HumidifierAccessory {
    /// Wire `service` to a new session over `transport`. Must be called
    /// from within a tokio runtime.
    pub fn new(
        uuid: Uuid,
        device: &DeviceConfig,
        service: Arc<dyn HumidifierService>,
        transport: Arc<dyn Transport>,
        config: &SessionConfig,
    ) -> Self {
        service.set_accessory_info(&AccessoryInfo {
            name: device.name.clone(),
            manufacturer: MANUFACTURER.into(),
            model: MODEL.into(),
            serial_number: uuid.to_string(),
        });
        service.set_primary();

        for characteristic in HUMIDIFIER_SERVICE {
            service.configure(characteristic, &characteristic.props());
        }

        let sink: Arc<dyn CharacteristicSink> = Arc::new(ServiceSink(Arc::clone(&service)));
        let session = DeviceSession::spawn(transport, sink, config);

        for characteristic in HUMIDIFIER_SERVICE
            .into_iter()
            .filter(|c| c.is_writable())
        {
            let handle = session.clone();
            service.on_set(
                characteristic,
                Box::new(move |value| handle.set(characteristic, value)),
            );
        }

        debug!(device_id = %device.id, %uuid, "humidifier accessory wired");
        Self {
            uuid,
            name: device.name.clone(),
            session,
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn session(&self) -> &DeviceSession {
        &self.session
    }

    pub async fn dispose(&self) {
        self.session.dispose().await;
    }
}

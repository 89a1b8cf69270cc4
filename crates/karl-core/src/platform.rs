// ── Platform ──
//
// Registry of bridged appliances. Maps configured devices to stable
// accessory UUIDs, restores accessories the host cached from a previous
// run, registers the rest, and owns one HumidifierAccessory per device.

use std::sync::Arc;

use dashmap::DashMap;
use karl_api::TransportFactory;
use tracing::{debug, info};
use uuid::Uuid;

use crate::accessory::{HumidifierAccessory, HumidifierService};
use crate::config::{DeviceConfig, SessionConfig};
use crate::error::CoreError;
use crate::session::DeviceSession;

/// An accessory as the host persists it between runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformAccessory {
    pub uuid: Uuid,
    pub display_name: String,
    /// Device id stored in the accessory context.
    pub device_id: String,
}

/// What the platform needs from the automation host.
pub trait AccessoryHost: Send + Sync {
    fn register_accessories(&self, accessories: &[PlatformAccessory]);

    /// Persist refreshed context of already-registered accessories.
    fn update_accessories(&self, accessories: &[PlatformAccessory]);

    fn unregister_accessories(&self, accessories: &[PlatformAccessory]);

    /// The humidifier service of `accessory`, created on first use.
    fn humidifier_service(&self, accessory: &PlatformAccessory) -> Arc<dyn HumidifierService>;
}

/// Stable accessory UUID for a device id.
pub fn accessory_uuid(device_id: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, device_id.as_bytes())
}

pub struct Platform {
    host: Arc<dyn AccessoryHost>,
    transports: Arc<dyn TransportFactory>,
    devices: Vec<DeviceConfig>,
    session_config: SessionConfig,
    known: DashMap<Uuid, PlatformAccessory>,
    accessories: DashMap<Uuid, HumidifierAccessory>,
}

impl Platform {
    pub fn new(
        host: Arc<dyn AccessoryHost>,
        transports: Arc<dyn TransportFactory>,
        devices: Vec<DeviceConfig>,
        session_config: SessionConfig,
    ) -> Self {
        Self {
            host,
            transports,
            devices,
            session_config,
            known: DashMap::new(),
            accessories: DashMap::new(),
        }
    }

    /// Remember an accessory the host restored from its cache.
    pub fn configure_accessory(&self, accessory: PlatformAccessory) {
        info!(name = %accessory.display_name, "loading accessory from cache");
        self.known.insert(accessory.uuid, accessory);
    }

    /// Restore or register every configured device and start its session.
    ///
    /// Devices that are already wired are left alone. Returns the number of
    /// accessories wired by this call. Must be called from within a tokio
    /// runtime.
    pub fn discover_devices(&self) -> usize {
        let mut wired = 0;

        for device in &self.devices {
            let uuid = accessory_uuid(&device.id);
            if self.accessories.contains_key(&uuid) {
                debug!(device_id = %device.id, "accessory already wired");
                continue;
            }

            let accessory = PlatformAccessory {
                uuid,
                display_name: device.name.clone(),
                device_id: device.id.clone(),
            };

            if self.known.contains_key(&uuid) {
                info!(name = %device.name, "restoring existing accessory from cache");
                self.host
                    .update_accessories(std::slice::from_ref(&accessory));
            } else {
                info!(name = %device.name, "adding new accessory");
                self.host
                    .register_accessories(std::slice::from_ref(&accessory));
            }

            let service = self.host.humidifier_service(&accessory);
            let transport = self.transports.open(&device.identity());
            let humidifier =
                HumidifierAccessory::new(uuid, device, service, transport, &self.session_config);

            self.known.insert(uuid, accessory);
            self.accessories.insert(uuid, humidifier);
            wired += 1;
        }

        wired
    }

    /// Unregister an accessory from the host and dispose its session.
    pub async fn remove_accessory(&self, uuid: Uuid) -> Result<(), CoreError> {
        let known = self.known.remove(&uuid);
        let wired = self.accessories.remove(&uuid);

        if known.is_none() && wired.is_none() {
            return Err(CoreError::AccessoryNotFound {
                identifier: uuid.to_string(),
            });
        }

        if let Some((_, accessory)) = known {
            info!(name = %accessory.display_name, "removing accessory");
            self.host.unregister_accessories(&[accessory]);
        }
        if let Some((_, humidifier)) = wired {
            humidifier.dispose().await;
        }
        Ok(())
    }

    /// Dispose every running session.
    pub async fn shutdown(&self) {
        let uuids: Vec<Uuid> = self.accessories.iter().map(|e| *e.key()).collect();
        for uuid in uuids {
            if let Some((_, humidifier)) = self.accessories.remove(&uuid) {
                humidifier.dispose().await;
            }
        }
        debug!("platform shut down");
    }

    /// Session of a wired accessory.
    pub fn session(&self, uuid: Uuid) -> Option<DeviceSession> {
        self.accessories.get(&uuid).map(|a| a.session().clone())
    }

    /// Accessories known to the platform, cached or wired.
    pub fn accessories(&self) -> Vec<PlatformAccessory> {
        let mut all: Vec<PlatformAccessory> =
            self.known.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        all
    }

    pub fn devices(&self) -> &[DeviceConfig] {
        &self.devices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_is_stable_per_device() {
        assert_eq!(accessory_uuid("bf01"), accessory_uuid("bf01"));
        assert_ne!(accessory_uuid("bf01"), accessory_uuid("bf02"));
        assert_eq!(accessory_uuid("bf01").get_version_num(), 5);
    }
}

// karl-core: Value translation and connection supervision between a
// smart-home host and Stadler Form Karl humidifiers.

pub mod accessory;
pub mod config;
pub mod error;
pub mod model;
pub mod platform;
pub mod session;
pub mod translate;

// ── Primary re-exports ──────────────────────────────────────────────
pub use accessory::{AccessoryInfo, HumidifierAccessory, HumidifierService, SetHandler};
pub use config::{DEFAULT_RECONNECT_DELAY, DeviceConfig, SessionConfig};
pub use error::CoreError;
pub use model::{Characteristic, CharacteristicProps, DataPoint, HUMIDIFIER_SERVICE};
pub use platform::{AccessoryHost, Platform, PlatformAccessory, accessory_uuid};
pub use session::{CharacteristicSink, DeviceSession, SessionState, apply_state_report};
pub use translate::{to_raw, to_semantic};

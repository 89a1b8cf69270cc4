// ── Domain model ──
//
// The appliance's data points and the characteristics the host sees.
// `use karl_core::model::*` gives you both.

pub mod characteristic;
pub mod data_point;

pub use characteristic::{Characteristic, CharacteristicProps, HUMIDIFIER_SERVICE};
pub use data_point::DataPoint;

// ── Data points ──
//
// The fixed set of channels the Karl firmware exposes. Numbers are defined
// by the appliance protocol; they never change at runtime.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoEnumIterator};

/// One addressable field in the appliance's state protocol.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DataPoint {
    /// On/off switch. `bool`.
    Power,
    /// Measured relative humidity in percent. Integer.
    CurrentHumidity,
    /// Lack-of-water fault flag. `1` means the tank is empty.
    WaterFault,
    /// Child lock. Known to the firmware, not bridged.
    ChildLock,
    /// Remaining filter life in percent. `0` means replace now.
    FilterLife,
    /// Display light: `Close`, `Half`, `Fully`.
    Light,
    /// Fan level: `level_1` .. `level_4`.
    FanSpeed,
    /// Automatic humidity control. `bool`.
    AutoMode,
    /// Humidity set point: `40`, `45`, `50`, `55`, or `CO` (continuous).
    TargetHumidity,
}

impl DataPoint {
    /// Protocol number of this data point.
    pub const fn code(self) -> u16 {
        match self {
            Self::Power => 1,
            Self::CurrentHumidity => 14,
            Self::WaterFault => 22,
            Self::ChildLock => 29,
            Self::FilterLife => 33,
            Self::Light => 34,
            Self::FanSpeed => 101,
            Self::AutoMode => 102,
            Self::TargetHumidity => 103,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        Self::iter().find(|dp| dp.code() == code)
    }

    /// Parse the string key used in `dps` maps (`"103"`).
    pub fn from_key(key: &str) -> Option<Self> {
        key.parse().ok().and_then(Self::from_code)
    }

    /// The string key used in `dps` maps.
    pub fn key(self) -> String {
        self.code().to_string()
    }
}

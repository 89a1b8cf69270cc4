// ── Host-side characteristics ──
//
// The semantic properties the automation host sees on the humidifier
// service, with the value constraints the host enforces before calling us.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use super::data_point::DataPoint;

/// A semantic property exposed to the host.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Characteristic {
    /// Power. `1` active, `0` inactive.
    ActiveState,
    /// Humidity threshold on a 20-step scale.
    TargetHumidity,
    /// Rotation speed on a 25-step scale.
    FanSpeed,
    /// Target humidifier state. `0` auto, `1` humidify.
    OperatingMode,
    /// Current humidifier state. `1` idle, `2` humidifying. Declared only.
    CurrentOperatingState,
    /// Measured relative humidity.
    CurrentHumidity,
    /// `0` when the tank is empty, `100` otherwise.
    WaterLevel,
    /// `1` when the filter needs replacing.
    FilterChangeIndication,
    /// Remaining filter life in percent.
    FilterLifeLevel,
    /// Display brightness on a 50-step scale. Session API only.
    LightLevel,
}

/// Value constraints declared on a characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacteristicProps {
    pub min_value: u8,
    pub max_value: u8,
    pub min_step: u8,
    /// Allowed values. Empty means any step in `min_value..=max_value`.
    pub valid_values: &'static [u8],
    pub writable: bool,
}

impl CharacteristicProps {
    /// Whether the host would accept `value` for this characteristic.
    pub fn accepts(&self, value: u8) -> bool {
        if !self.valid_values.is_empty() {
            return self.valid_values.contains(&value);
        }
        (self.min_value..=self.max_value).contains(&value)
            && (value - self.min_value) % self.min_step.max(1) == 0
    }
}

const fn read_only_percent() -> CharacteristicProps {
    CharacteristicProps {
        min_value: 0,
        max_value: 100,
        min_step: 1,
        valid_values: &[],
        writable: false,
    }
}

/// Characteristics registered on the humidifier service, in registration order.
pub const HUMIDIFIER_SERVICE: [Characteristic; 9] = [
    Characteristic::ActiveState,
    Characteristic::TargetHumidity,
    Characteristic::FanSpeed,
    Characteristic::CurrentOperatingState,
    Characteristic::OperatingMode,
    Characteristic::CurrentHumidity,
    Characteristic::WaterLevel,
    Characteristic::FilterChangeIndication,
    Characteristic::FilterLifeLevel,
];

impl Characteristic {
    /// The data point backing this characteristic, if any.
    pub const fn data_point(self) -> Option<DataPoint> {
        match self {
            Self::ActiveState => Some(DataPoint::Power),
            Self::TargetHumidity => Some(DataPoint::TargetHumidity),
            Self::FanSpeed => Some(DataPoint::FanSpeed),
            Self::OperatingMode => Some(DataPoint::AutoMode),
            Self::CurrentOperatingState => None,
            Self::CurrentHumidity => Some(DataPoint::CurrentHumidity),
            Self::WaterLevel => Some(DataPoint::WaterFault),
            Self::FilterChangeIndication | Self::FilterLifeLevel => Some(DataPoint::FilterLife),
            Self::LightLevel => Some(DataPoint::Light),
        }
    }

    /// Characteristics refreshed when `dp` appears in a state report.
    ///
    /// The light is absent on purpose: its read path is disabled.
    pub const fn reported_by(dp: DataPoint) -> &'static [Characteristic] {
        match dp {
            DataPoint::Power => &[Self::ActiveState],
            DataPoint::CurrentHumidity => &[Self::CurrentHumidity],
            DataPoint::WaterFault => &[Self::WaterLevel],
            DataPoint::FilterLife => &[Self::FilterChangeIndication, Self::FilterLifeLevel],
            DataPoint::FanSpeed => &[Self::FanSpeed],
            DataPoint::AutoMode => &[Self::OperatingMode],
            DataPoint::TargetHumidity => &[Self::TargetHumidity],
            DataPoint::Light | DataPoint::ChildLock => &[],
        }
    }

    pub const fn props(self) -> CharacteristicProps {
        match self {
            Self::ActiveState | Self::OperatingMode => CharacteristicProps {
                min_value: 0,
                max_value: 1,
                min_step: 1,
                valid_values: &[0, 1],
                writable: true,
            },
            Self::TargetHumidity => CharacteristicProps {
                min_value: 20,
                max_value: 100,
                min_step: 20,
                valid_values: &[20, 40, 60, 80, 100],
                writable: true,
            },
            Self::FanSpeed => CharacteristicProps {
                min_value: 25,
                max_value: 100,
                min_step: 25,
                valid_values: &[25, 50, 75, 100],
                writable: true,
            },
            Self::LightLevel => CharacteristicProps {
                min_value: 0,
                max_value: 100,
                min_step: 50,
                valid_values: &[0, 50, 100],
                writable: true,
            },
            Self::CurrentOperatingState => CharacteristicProps {
                min_value: 1,
                max_value: 2,
                min_step: 1,
                valid_values: &[1, 2],
                writable: false,
            },
            Self::FilterChangeIndication => CharacteristicProps {
                min_value: 0,
                max_value: 1,
                min_step: 1,
                valid_values: &[0, 1],
                writable: false,
            },
            Self::CurrentHumidity | Self::WaterLevel | Self::FilterLifeLevel => {
                read_only_percent()
            }
        }
    }

    pub const fn is_writable(self) -> bool {
        self.props().writable
    }
}

// ── Value translation ──
//
// Pure lookup tables between host-side characteristic values and raw
// data-point values. Nothing here touches device or network state.
//
// Inbound values outside a table are dropped (`None`), never an error.
// Outbound values outside a table are `None` too; the session turns that
// into a rejected command.

use karl_api::DpsValue;

use crate::model::Characteristic;

/// Host level ↔ raw string for the humidity set point (data point 103).
const TARGET_HUMIDITY: [(u8, &str); 5] = [
    (20, "40"),
    (40, "45"),
    (60, "50"),
    (80, "55"),
    (100, "CO"),
];

/// Host level ↔ raw string for the fan (data point 101).
const FAN_SPEED: [(u8, &str); 4] = [
    (25, "level_1"),
    (50, "level_2"),
    (75, "level_3"),
    (100, "level_4"),
];

fn lookup_raw(table: &[(u8, &'static str)], level: u8) -> Option<DpsValue> {
    table
        .iter()
        .find(|(semantic, _)| *semantic == level)
        .map(|(_, raw)| DpsValue::from(*raw))
}

fn lookup_semantic(table: &[(u8, &str)], raw: &DpsValue) -> Option<u8> {
    let text = raw.to_string();
    table
        .iter()
        .find(|(_, candidate)| *candidate == text)
        .map(|(semantic, _)| *semantic)
}

/// Strict `== n` against a raw flag: only an integer matches, never a
/// boolean or a numeric string.
fn raw_is(raw: &DpsValue, n: i64) -> bool {
    matches!(raw, DpsValue::Int(v) if *v == n)
}

fn percent(raw: &DpsValue) -> Option<u8> {
    raw.as_int()
        .filter(|n| (0..=100).contains(n))
        .and_then(|n| u8::try_from(n).ok())
}

/// Translate a host-side value into the raw value for the backing data point.
///
/// Returns `None` for read-only characteristics and for levels that have no
/// table entry.
pub fn to_raw(characteristic: Characteristic, value: u8) -> Option<DpsValue> {
    match characteristic {
        Characteristic::ActiveState => Some(DpsValue::Bool(value == 1)),
        Characteristic::OperatingMode => Some(DpsValue::Bool(value == 0)),
        Characteristic::TargetHumidity => lookup_raw(&TARGET_HUMIDITY, value),
        Characteristic::FanSpeed => lookup_raw(&FAN_SPEED, value),
        Characteristic::LightLevel => Some(DpsValue::from(match value {
            0 => "Close",
            50 => "Half",
            _ => "Fully",
        })),
        Characteristic::CurrentOperatingState
        | Characteristic::CurrentHumidity
        | Characteristic::WaterLevel
        | Characteristic::FilterChangeIndication
        | Characteristic::FilterLifeLevel => None,
    }
}

/// Translate a raw data-point value into the host-side value.
///
/// Returns `None` when the raw value is not in the characteristic's table,
/// and always for the light, whose read path is disabled.
pub fn to_semantic(characteristic: Characteristic, raw: &DpsValue) -> Option<u8> {
    match characteristic {
        Characteristic::ActiveState => Some(u8::from(raw.is_truthy())),
        Characteristic::OperatingMode => Some(u8::from(!raw.is_truthy())),
        Characteristic::TargetHumidity => lookup_semantic(&TARGET_HUMIDITY, raw),
        Characteristic::FanSpeed => lookup_semantic(&FAN_SPEED, raw),
        Characteristic::WaterLevel => Some(if raw_is(raw, 1) { 0 } else { 100 }),
        // Gated on the same check as the life level so data point 33 always
        // yields both filter characteristics or neither.
        Characteristic::FilterChangeIndication => {
            percent(raw).map(|_| u8::from(raw_is(raw, 0)))
        }
        Characteristic::FilterLifeLevel | Characteristic::CurrentHumidity => percent(raw),
        Characteristic::LightLevel | Characteristic::CurrentOperatingState => None,
    }
}

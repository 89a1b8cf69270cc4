//! Shared helpers for command handlers.

use std::str::FromStr;
use std::time::Duration;

use strum::IntoEnumIterator;

use karl_core::{Characteristic, HUMIDIFIER_SERVICE};

use crate::error::CliError;

/// Parse a humantime duration flag such as `250ms` or `5s`.
pub fn parse_duration(field: &str, text: &str) -> Result<Duration, CliError> {
    humantime::parse_duration(text).map_err(|e| CliError::Validation {
        field: field.into(),
        reason: format!("'{text}': {e}"),
    })
}

/// Parse a `property=value` host write, e.g. `target-humidity=60`.
///
/// Only characteristics the host can write are accepted.
pub fn parse_assignment(text: &str) -> Result<(Characteristic, u8), CliError> {
    let invalid = |reason: String| CliError::Validation {
        field: "--set".into(),
        reason,
    };

    let (name, value) = text
        .split_once('=')
        .ok_or_else(|| invalid(format!("'{text}' is not PROPERTY=VALUE")))?;

    let characteristic = Characteristic::from_str(name.trim())
        .ok()
        .filter(|c| c.is_writable() && HUMIDIFIER_SERVICE.contains(c))
        .ok_or_else(|| {
            invalid(format!(
                "'{}' is not a writable property (expected one of: {})",
                name.trim(),
                writable_names().join(", ")
            ))
        })?;

    let value: u8 = value
        .trim()
        .parse()
        .map_err(|_| invalid(format!("'{}' is not a value between 0 and 255", value.trim())))?;

    Ok((characteristic, value))
}

fn writable_names() -> Vec<String> {
    Characteristic::iter()
        .filter(|c| c.is_writable() && HUMIDIFIER_SERVICE.contains(c))
        .map(|c| c.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn parses_writable_assignment() {
        assert_eq!(
            parse_assignment("target-humidity=60").unwrap(),
            (Characteristic::TargetHumidity, 60)
        );
        assert_eq!(
            parse_assignment(" fan-speed = 25 ").unwrap(),
            (Characteristic::FanSpeed, 25)
        );
    }

    #[test]
    fn rejects_read_only_and_unknown_properties() {
        let err = parse_assignment("current-humidity=40").unwrap_err();
        assert!(err.to_string().contains("active-state"));
        assert!(parse_assignment("light-level=50").is_err());
        assert!(parse_assignment("volume=3").is_err());
        assert!(parse_assignment("fan-speed").is_err());
        assert!(parse_assignment("fan-speed=fast").is_err());
    }

    #[test]
    fn parses_durations() {
        assert_eq!(
            parse_duration("--settle", "250ms").unwrap(),
            Duration::from_millis(250)
        );
        assert!(parse_duration("--settle", "later").is_err());
    }
}

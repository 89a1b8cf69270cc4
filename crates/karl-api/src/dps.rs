// ── Raw data-point values ──
//
// Everything the appliance reports or accepts is a `dps` map keyed by the
// data-point number rendered as a string. Values are loosely typed: booleans
// for switches, integers for percentages and flags, strings for enumerations.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A single raw data-point value as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DpsValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl DpsValue {
    /// Convert a JSON value, returning `None` for shapes the appliance never sends
    /// (floats, arrays, objects, null).
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(Self::Bool(*b)),
            serde_json::Value::Number(n) => n.as_i64().map(Self::Int),
            serde_json::Value::String(s) => Some(Self::Str(s.clone())),
            _ => None,
        }
    }

    /// Loose truthiness: `false`, `0` and `""` are false, everything else true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Int(n) => *n != 0,
            Self::Str(s) => !s.is_empty(),
        }
    }

    /// Integer view. Numeric strings are accepted; booleans are not.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Str(s) => s.trim().parse().ok(),
            Self::Bool(_) => None,
        }
    }
}

impl fmt::Display for DpsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<bool> for DpsValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for DpsValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<&str> for DpsValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<String> for DpsValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

// ── ReportKind ───────────────────────────────────────────────────────

/// How a state report reached us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    /// Full-state push, typically right after connecting (`dp-refresh`).
    Refresh,
    /// Incremental delta after a change on the device (`data`).
    Data,
}

// ── DpsPayload ───────────────────────────────────────────────────────

/// A state report: data-point key → raw value, plus the device timestamp.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DpsPayload {
    pub dps: BTreeMap<String, DpsValue>,

    /// Device-side epoch seconds, when the firmware includes one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t: Option<i64>,
}

/// Envelope as decoded from the transport, before value normalization.
#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(default)]
    dps: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    t: Option<i64>,
}

impl DpsPayload {
    /// Payload carrying a single data point.
    pub fn single(key: impl Into<String>, value: impl Into<DpsValue>) -> Self {
        let mut payload = Self::default();
        payload.insert(key, value);
        payload
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<DpsValue>) {
        self.dps.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&DpsValue> {
        self.dps.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.dps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.dps.len()
    }

    /// Device timestamp as a `DateTime`, if present and in range.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.t.and_then(|ts| DateTime::from_timestamp(ts, 0))
    }

    /// Decode a `{"dps": {...}, "t": ...}` JSON envelope.
    ///
    /// Individual values of an unexpected shape are skipped so one odd data
    /// point never hides the rest of the report. A missing `dps` object
    /// yields an empty payload.
    pub fn from_json_str(text: &str) -> Result<Self, Error> {
        let envelope: RawEnvelope =
            serde_json::from_str(text).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body: text.to_owned(),
            })?;

        let mut dps = BTreeMap::new();
        for (key, raw) in envelope.dps.unwrap_or_default() {
            match DpsValue::from_json(&raw) {
                Some(value) => {
                    dps.insert(key, value);
                }
                None => {
                    tracing::debug!(key, raw = %raw, "skipping data point with unsupported value");
                }
            }
        }

        Ok(Self { dps, t: envelope.t })
    }
}

impl FromIterator<(String, DpsValue)> for DpsPayload {
    fn from_iter<I: IntoIterator<Item = (String, DpsValue)>>(iter: I) -> Self {
        Self {
            dps: iter.into_iter().collect(),
            t: None,
        }
    }
}

//! Normalized point-in-time charger status

use crate::transport::RawStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Overall car state; the sentinel value marks an untrustworthy payload
pub const CAR_STATUS: &str = "car_status";
pub const CAR_STATUS_UNKNOWN: &str = "unknown";

pub const CHARGER_MAX_CURRENT: &str = "charger_max_current";
pub const CHARGER_ABSOLUTE_MAX_CURRENT: &str = "charger_absolute_max_current";
pub const CHARGE_LIMIT: &str = "charge_limit";
pub const CABLE_LOCK_MODE: &str = "cable_lock_mode";
pub const PHASE_MODE: &str = "phase_mode";
pub const ALLOW_CHARGING: &str = "allow_charging";
pub const ENERGY_TOTAL: &str = "energy_total";
pub const ENERGY_TOTAL_CORRECTED: &str = "energy_total_corrected";
pub const SESSION_ENERGY: &str = "current_session_charged_energy";
pub const SESSION_ENERGY_CORRECTED: &str = "current_session_charged_energy_corrected";
pub const SERIAL_NUMBER: &str = "serial_number";

/// Typed value of one status field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Flag(bool),
    Number(f64),
    Text(String),
}

impl FieldValue {
    /// Convert a scalar JSON value; arrays, objects and null yield `None`
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(FieldValue::Flag(*b)),
            serde_json::Value::Number(n) => n.as_f64().map(FieldValue::Number),
            serde_json::Value::String(s) => Some(FieldValue::Text(s.clone())),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(s) => s.trim().parse().ok(),
            FieldValue::Flag(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Flag(b) => Some(*b),
            FieldValue::Text(s) => match s.as_str() {
                "on" | "true" | "1" => Some(true),
                "off" | "false" | "0" => Some(false),
                _ => None,
            },
            FieldValue::Number(n) => Some(*n != 0.0),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Flag(b) => write!(f, "{}", b),
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Number(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Flag(v)
    }
}

/// Normalized status of one charger at one point in time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    fields: BTreeMap<String, FieldValue>,
    fetched_at: Option<DateTime<Utc>>,
}

impl StatusSnapshot {
    /// Snapshot with no fields, used before the first successful fetch
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a snapshot from a normalized raw mapping. Fields whose value is
    /// not a scalar are skipped rather than failing the whole snapshot.
    pub fn from_raw(raw: &RawStatus, fetched_at: DateTime<Utc>) -> Self {
        let fields = raw
            .iter()
            .filter_map(|(k, v)| FieldValue::from_json(v).map(|fv| (k.clone(), fv)))
            .collect();
        Self {
            fields,
            fetched_at: Some(fetched_at),
        }
    }

    pub fn from_fields<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, FieldValue)>,
        K: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            fetched_at: Some(Utc::now()),
        }
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn number(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(FieldValue::as_f64)
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(FieldValue::as_str)
    }

    pub fn car_status(&self) -> Option<&str> {
        self.text(CAR_STATUS)
    }

    /// A missing or "unknown" car status invalidates the whole payload
    pub fn is_sentinel(&self) -> bool {
        match self.get(CAR_STATUS) {
            None => true,
            Some(FieldValue::Text(s)) => s == CAR_STATUS_UNKNOWN,
            Some(_) => false,
        }
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.fetched_at
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Add the corrected energy fields derived from the raw counters
    pub(crate) fn apply_correction(&mut self, factor: f64) {
        for (source, target) in [
            (ENERGY_TOTAL, ENERGY_TOTAL_CORRECTED),
            (SESSION_ENERGY, SESSION_ENERGY_CORRECTED),
        ] {
            if let Some(v) = self.number(source) {
                self.fields
                    .insert(target.to_string(), FieldValue::Number(v * factor));
            }
        }
    }
}

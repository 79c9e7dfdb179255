use super::{CableLockMode, ChargerProtocol, PhaseMode, ProtocolVersion};
use crate::error::Result;
use crate::snapshot::{
    ALLOW_CHARGING, CABLE_LOCK_MODE, CAR_STATUS, CAR_STATUS_UNKNOWN, CHARGE_LIMIT,
    CHARGER_ABSOLUTE_MAX_CURRENT, CHARGER_MAX_CURRENT, ENERGY_TOTAL, PHASE_MODE, SERIAL_NUMBER,
    SESSION_ENERGY,
};
use crate::transport::{RawStatus, V2ChargingMode, V2Transport};
use serde_json::{Value, json};
use std::sync::Arc;

const KEY_ABSOLUTE_MAX_CURRENT: &str = "ama";
const KEY_CABLE_LOCK: &str = "ust";
const KEY_CHARGE_LIMIT: &str = "dwo";
const KEY_PHASE_MODE: &str = "psm";

/// Keys whose value only needs a new name
const RENAMES: &[(&str, &str)] = &[
    ("amp", CHARGER_MAX_CURRENT),
    (KEY_ABSOLUTE_MAX_CURRENT, CHARGER_ABSOLUTE_MAX_CURRENT),
    (KEY_CABLE_LOCK, CABLE_LOCK_MODE),
    (KEY_PHASE_MODE, PHASE_MODE),
    ("cbl", "cable_max_current"),
    ("err", "charger_err"),
    ("fwv", "firmware"),
    ("sse", SERIAL_NUMBER),
    ("wss", "wifi_ssid"),
];

/// `nrg` array slots: (field, divisor to reach the V1 unit)
const ENERGY_SLOTS: &[(&str, f64)] = &[
    ("u_l1", 1.0),
    ("u_l2", 1.0),
    ("u_l3", 1.0),
    ("u_n", 1.0),
    ("i_l1", 1.0),
    ("i_l2", 1.0),
    ("i_l3", 1.0),
    ("p_l1", 1000.0),
    ("p_l2", 1000.0),
    ("p_l3", 1000.0),
    ("p_n", 1000.0),
    ("p_all", 1000.0),
    ("lf_l1", 1.0),
    ("lf_l2", 1.0),
    ("lf_l3", 1.0),
    ("lf_n", 1.0),
];

/// Current API: short field keys, Wh energy counters, a numeric car state
/// and one generic key setter for most writes.
pub struct V2Protocol {
    client: Arc<dyn V2Transport>,
}

impl V2Protocol {
    pub fn new(client: Arc<dyn V2Transport>) -> Self {
        Self { client }
    }
}

fn car_state_text(code: Option<i64>) -> &'static str {
    match code {
        Some(1) => "Charger ready, no car connected",
        Some(2) => "Car is charging",
        Some(3) => "Waiting for car",
        Some(4) => "Charging finished, car still connected",
        Some(5) => "Error",
        _ => CAR_STATUS_UNKNOWN,
    }
}

fn wh_to_kwh(value: &Value) -> Option<Value> {
    value.as_f64().map(|wh| json!(wh / 1000.0))
}

/// Translate a V2 status map into logical field names and V1 units.
/// Unrecognised keys pass through untouched.
pub(crate) fn normalize_status(raw: RawStatus) -> RawStatus {
    let mut out = RawStatus::new();

    for (key, value) in raw {
        match key.as_str() {
            "car" => {
                out.insert(
                    CAR_STATUS.to_string(),
                    json!(car_state_text(value.as_i64())),
                );
            }
            KEY_CHARGE_LIMIT => {
                // null means no limit is set
                let kwh = wh_to_kwh(&value).unwrap_or_else(|| json!(0.0));
                out.insert(CHARGE_LIMIT.to_string(), kwh);
            }
            "wh" => {
                if let Some(kwh) = wh_to_kwh(&value) {
                    out.insert(SESSION_ENERGY.to_string(), kwh);
                }
            }
            "eto" => {
                if let Some(kwh) = wh_to_kwh(&value) {
                    out.insert(ENERGY_TOTAL.to_string(), kwh);
                }
            }
            "alw" => {
                let on = value.as_bool().unwrap_or(false);
                out.insert(
                    ALLOW_CHARGING.to_string(),
                    json!(if on { "on" } else { "off" }),
                );
            }
            "nrg" => {
                if let Some(values) = value.as_array() {
                    for ((field, divisor), v) in ENERGY_SLOTS.iter().zip(values) {
                        if let Some(n) = v.as_f64() {
                            out.insert((*field).to_string(), json!(n / divisor));
                        }
                    }
                }
            }
            "tma" => {
                if let Some(temps) = value.as_array() {
                    for (idx, t) in temps.iter().enumerate() {
                        if t.is_number() {
                            out.insert(format!("charger_temp{}", idx), t.clone());
                        }
                    }
                    if let Some(first) = temps.first().filter(|t| t.is_number()) {
                        out.insert("charger_temp".to_string(), first.clone());
                    }
                }
            }
            other => match RENAMES.iter().find(|(from, _)| *from == other) {
                Some((_, to)) => {
                    out.insert((*to).to_string(), value);
                }
                None => {
                    out.insert(key, value);
                }
            },
        }
    }

    out
}

#[async_trait::async_trait]
impl ChargerProtocol for V2Protocol {
    fn version(&self) -> ProtocolVersion {
        ProtocolVersion::V2
    }

    async fn fetch_status(&self) -> Result<RawStatus> {
        let raw = self.client.get_status().await?;
        Ok(normalize_status(raw))
    }

    async fn set_max_current(&self, amps: u8) -> Result<()> {
        self.client.set_ampere(amps).await
    }

    async fn set_absolute_max_current(&self, amps: u8) -> Result<()> {
        self.client
            .set_key(KEY_ABSOLUTE_MAX_CURRENT, json!(amps))
            .await
    }

    async fn set_charge_limit(&self, kwh: f64) -> Result<()> {
        // The device stores the limit in whole Wh
        let wh = (kwh * 1000.0).round() as u64;
        self.client.set_key(KEY_CHARGE_LIMIT, json!(wh)).await
    }

    async fn set_cable_lock_mode(&self, mode: CableLockMode) -> Result<()> {
        self.client.set_key(KEY_CABLE_LOCK, json!(mode.code())).await
    }

    async fn set_phase_mode(&self, mode: PhaseMode) -> Result<()> {
        self.client.set_key(KEY_PHASE_MODE, json!(mode.code())).await
    }

    async fn set_charging_enabled(&self, enabled: bool) -> Result<()> {
        let mode = if enabled {
            V2ChargingMode::On
        } else {
            V2ChargingMode::Off
        };
        self.client.set_charging_mode(mode).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(value: Value) -> RawStatus {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn normalizes_names_and_units() {
        let out = normalize_status(raw(json!({
            "car": 2,
            "amp": 16,
            "ama": 32,
            "dwo": 2500,
            "alw": true,
            "wh": 1500.0,
            "eto": 123400,
            "ust": 1,
            "psm": 2,
            "sse": "012345",
            "foo": "bar"
        })));
        assert_eq!(out["car_status"], json!("Car is charging"));
        assert_eq!(out["charger_max_current"], json!(16));
        assert_eq!(out["charger_absolute_max_current"], json!(32));
        assert_eq!(out["charge_limit"], json!(2.5));
        assert_eq!(out["allow_charging"], json!("on"));
        assert_eq!(out["current_session_charged_energy"], json!(1.5));
        assert_eq!(out["energy_total"], json!(123.4));
        assert_eq!(out["cable_lock_mode"], json!(1));
        assert_eq!(out["phase_mode"], json!(2));
        assert_eq!(out["serial_number"], json!("012345"));
        assert_eq!(out["foo"], json!("bar"));
    }

    #[test]
    fn expands_energy_and_temperature_arrays() {
        let out = normalize_status(raw(json!({
            "car": 1,
            "nrg": [230, 231, 229, 0, 6.1, 6.2, 6.3, 1400, 1430, 1450, 0, 4280],
            "tma": [21.5, 23.0]
        })));
        assert_eq!(out["u_l2"], json!(231.0));
        assert_eq!(out["i_l3"], json!(6.3));
        assert_eq!(out["p_l1"], json!(1.4));
        assert_eq!(out["p_all"], json!(4.28));
        assert!(!out.contains_key("lf_l1"));
        assert_eq!(out["charger_temp"], json!(21.5));
        assert_eq!(out["charger_temp1"], json!(23.0));
    }

    #[test]
    fn unknown_or_missing_car_state_is_sentinel() {
        let out = normalize_status(raw(json!({"car": 0})));
        assert_eq!(out["car_status"], json!("unknown"));
        let out = normalize_status(raw(json!({"dwo": null})));
        assert!(!out.contains_key("car_status"));
        assert_eq!(out["charge_limit"], json!(0.0));
    }
}

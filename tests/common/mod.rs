#![allow(dead_code)]

use async_trait::async_trait;
use goe_bridge::error::{GoeError, Result};
use goe_bridge::transport::{
    RawStatus, TransportFactory, V1CableLockMode, V1Transport, V2ChargingMode, V2Transport,
};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A write as seen by a mock transport
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    TmpMaxCurrent(u8),
    AbsoluteMaxCurrent(u8),
    ChargeLimit(f64),
    CableLock(V1CableLockMode),
    AllowCharging(bool),
    Ampere(u8),
    Key(String, Value),
    ChargingMode(V2ChargingMode),
}

/// Behaviour shared by both mock transports
#[derive(Debug)]
pub struct MockState {
    status: Mutex<RawStatus>,
    fail_status: Mutex<Option<String>>,
    fail_writes: Mutex<Option<String>>,
    delay: Mutex<Duration>,
    panic_next_status: AtomicBool,
    pub status_calls: AtomicUsize,
    writes: Mutex<Vec<Write>>,
}

impl MockState {
    fn new(status: Value) -> Self {
        Self {
            status: Mutex::new(status.as_object().cloned().unwrap_or_default()),
            fail_status: Mutex::new(None),
            fail_writes: Mutex::new(None),
            delay: Mutex::new(Duration::ZERO),
            panic_next_status: AtomicBool::new(false),
            status_calls: AtomicUsize::new(0),
            writes: Mutex::new(Vec::new()),
        }
    }

    pub fn set_status(&self, status: Value) {
        *self.status.lock().unwrap() = status.as_object().cloned().unwrap_or_default();
    }

    pub fn fail_status(&self, message: Option<&str>) {
        *self.fail_status.lock().unwrap() = message.map(str::to_string);
    }

    pub fn fail_writes(&self, message: Option<&str>) {
        *self.fail_writes.lock().unwrap() = message.map(str::to_string);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    /// Make the next status request panic, as a broken client would
    pub fn panic_next_status(&self) {
        self.panic_next_status.store(true, Ordering::SeqCst);
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> Vec<Write> {
        self.writes.lock().unwrap().clone()
    }

    async fn status(&self) -> Result<RawStatus> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if self.panic_next_status.swap(false, Ordering::SeqCst) {
            panic!("malformed status response");
        }
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(msg) = self.fail_status.lock().unwrap().clone() {
            return Err(GoeError::transport(msg));
        }
        Ok(self.status.lock().unwrap().clone())
    }

    fn write(&self, write: Write) -> Result<()> {
        self.writes.lock().unwrap().push(write);
        match self.fail_writes.lock().unwrap().clone() {
            Some(msg) => Err(GoeError::transport(msg)),
            None => Ok(()),
        }
    }
}

pub struct MockV1 {
    pub state: Arc<MockState>,
}

#[async_trait]
impl V1Transport for MockV1 {
    async fn request_status(&self) -> Result<RawStatus> {
        self.state.status().await
    }

    async fn set_tmp_max_current(&self, amps: u8) -> Result<()> {
        self.state.write(Write::TmpMaxCurrent(amps))
    }

    async fn set_absolute_max_current(&self, amps: u8) -> Result<()> {
        self.state.write(Write::AbsoluteMaxCurrent(amps))
    }

    async fn set_charge_limit(&self, kwh: f64) -> Result<()> {
        self.state.write(Write::ChargeLimit(kwh))
    }

    async fn set_cable_lock_mode(&self, mode: V1CableLockMode) -> Result<()> {
        self.state.write(Write::CableLock(mode))
    }

    async fn set_allow_charging(&self, allow: bool) -> Result<()> {
        self.state.write(Write::AllowCharging(allow))
    }
}

pub struct MockV2 {
    pub state: Arc<MockState>,
}

#[async_trait]
impl V2Transport for MockV2 {
    async fn get_status(&self) -> Result<RawStatus> {
        self.state.status().await
    }

    async fn set_ampere(&self, amps: u8) -> Result<()> {
        self.state.write(Write::Ampere(amps))
    }

    async fn set_key(&self, key: &str, value: Value) -> Result<()> {
        self.state.write(Write::Key(key.to_string(), value))
    }

    async fn set_charging_mode(&self, mode: V2ChargingMode) -> Result<()> {
        self.state.write(Write::ChargingMode(mode))
    }
}

/// Factory handing out mocks that all share one [`MockState`]
pub struct MockFactory {
    pub state: Arc<MockState>,
    pub built: AtomicUsize,
}

impl MockFactory {
    pub fn new(status: Value) -> Arc<Self> {
        Arc::new(Self {
            state: Arc::new(MockState::new(status)),
            built: AtomicUsize::new(0),
        })
    }

    pub fn built(&self) -> usize {
        self.built.load(Ordering::SeqCst)
    }
}

impl TransportFactory for MockFactory {
    fn v1(&self, _host: &str) -> Result<Arc<dyn V1Transport>> {
        self.built.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockV1 {
            state: Arc::clone(&self.state),
        }))
    }

    fn v2(&self, _host: &str) -> Result<Arc<dyn V2Transport>> {
        self.built.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockV2 {
            state: Arc::clone(&self.state),
        }))
    }
}

pub fn v1_status(max_current: u8) -> Value {
    json!({
        "car_status": "Car is charging",
        "charger_max_current": max_current,
        "charger_absolute_max_current": 32,
        "charge_limit": 0.0,
        "cable_lock_mode": 1,
        "allow_charging": "on",
        "energy_total": 100.0,
        "current_session_charged_energy": 2.0
    })
}

pub fn v2_status(amp: u8) -> Value {
    json!({
        "car": 2,
        "amp": amp,
        "ama": 32,
        "dwo": 2500,
        "alw": true,
        "wh": 1500.0,
        "eto": 100000,
        "psm": 0
    })
}

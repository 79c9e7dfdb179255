//! Vendor transport boundary
//!
//! The charger's local HTTP API is consumed through these traits. The crate
//! never speaks HTTP itself: the embedding host supplies a
//! [`TransportFactory`] that builds one client per charger host, either for
//! the legacy V1 API (named setters, logical field names) or the V2 API
//! (short field keys, a generic key/value setter).

use crate::error::Result;
use std::sync::Arc;

/// Flat field mapping returned by a status request
pub type RawStatus = serde_json::Map<String, serde_json::Value>;

/// Cable lock modes as encoded by the V1 API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum V1CableLockMode {
    UnlockCarFirst = 0,
    Automatic = 1,
    Locked = 2,
}

/// Forced charging state as encoded by the V2 `frc` key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum V2ChargingMode {
    Neutral = 0,
    Off = 1,
    On = 2,
}

/// Client for chargers speaking the V1 API
#[async_trait::async_trait]
pub trait V1Transport: Send + Sync {
    /// Full status request; keys are already the logical field names
    async fn request_status(&self) -> Result<RawStatus>;

    async fn set_tmp_max_current(&self, amps: u8) -> Result<()>;

    async fn set_absolute_max_current(&self, amps: u8) -> Result<()>;

    /// Charge limit in kWh (0 disables the limit)
    async fn set_charge_limit(&self, kwh: f64) -> Result<()>;

    async fn set_cable_lock_mode(&self, mode: V1CableLockMode) -> Result<()>;

    async fn set_allow_charging(&self, allow: bool) -> Result<()>;
}

/// Client for chargers speaking the V2 API
#[async_trait::async_trait]
pub trait V2Transport: Send + Sync {
    /// Full status request; keys are the vendor's short API keys
    async fn get_status(&self) -> Result<RawStatus>;

    async fn set_ampere(&self, amps: u8) -> Result<()>;

    /// Generic setter for a single API key
    async fn set_key(&self, key: &str, value: serde_json::Value) -> Result<()>;

    async fn set_charging_mode(&self, mode: V2ChargingMode) -> Result<()>;
}

/// Builds transport clients for a charger host
pub trait TransportFactory: Send + Sync {
    fn v1(&self, host: &str) -> Result<Arc<dyn V1Transport>>;

    fn v2(&self, host: &str) -> Result<Arc<dyn V2Transport>>;
}

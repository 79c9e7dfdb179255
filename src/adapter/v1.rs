use super::{CableLockMode, ChargerProtocol, ProtocolVersion};
use crate::error::Result;
use crate::transport::{RawStatus, V1CableLockMode, V1Transport};
use std::sync::Arc;

/// Legacy API: the vendor client already reports logical field names and
/// has one named setter per operation. Phase switching does not exist.
pub struct V1Protocol {
    client: Arc<dyn V1Transport>,
}

impl V1Protocol {
    pub fn new(client: Arc<dyn V1Transport>) -> Self {
        Self { client }
    }
}

fn to_v1_lock_mode(mode: CableLockMode) -> V1CableLockMode {
    match mode {
        CableLockMode::UnlockCarFirst => V1CableLockMode::UnlockCarFirst,
        CableLockMode::Automatic => V1CableLockMode::Automatic,
        CableLockMode::Locked => V1CableLockMode::Locked,
    }
}

#[async_trait::async_trait]
impl ChargerProtocol for V1Protocol {
    fn version(&self) -> ProtocolVersion {
        ProtocolVersion::V1
    }

    async fn fetch_status(&self) -> Result<RawStatus> {
        self.client.request_status().await
    }

    async fn set_max_current(&self, amps: u8) -> Result<()> {
        self.client.set_tmp_max_current(amps).await
    }

    async fn set_absolute_max_current(&self, amps: u8) -> Result<()> {
        self.client.set_absolute_max_current(amps).await
    }

    async fn set_charge_limit(&self, kwh: f64) -> Result<()> {
        self.client.set_charge_limit(kwh).await
    }

    async fn set_cable_lock_mode(&self, mode: CableLockMode) -> Result<()> {
        self.client
            .set_cable_lock_mode(to_v1_lock_mode(mode))
            .await
    }

    async fn set_charging_enabled(&self, enabled: bool) -> Result<()> {
        self.client.set_allow_charging(enabled).await
    }
}

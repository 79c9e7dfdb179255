//! Device adapter for go-e chargers
//!
//! Hides the two incompatible vendor API versions behind one read/write
//! contract. The protocol is picked once at construction; every write then
//! follows the same shape: validate and clamp the input, hand it to the
//! protocol variant, which either translates it into its vendor call or
//! rejects it with [`GoeError::UnsupportedOnProtocol`].

use crate::commands::ChargerCommand;
use crate::config::ChargerConfig;
use crate::error::{GoeError, Result};
use crate::logging::{LogContext, StructuredLogger, get_logger_with_context};
use crate::snapshot::StatusSnapshot;
use crate::transport::{RawStatus, TransportFactory};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

mod v1;
mod v2;

use v1::V1Protocol;
use v2::V2Protocol;

/// Lowest current (A) a charger accepts
pub const MIN_CURRENT_AMPS: i64 = 6;

/// Highest current (A) a charger accepts
pub const MAX_CURRENT_AMPS: i64 = 32;

/// How long a status request may take before it counts as failed
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Vendor API version spoken by a charger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolVersion {
    V1,
    V2,
}

impl FromStr for ProtocolVersion {
    type Err = GoeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "v1" => Ok(ProtocolVersion::V1),
            "2" | "v2" => Ok(ProtocolVersion::V2),
            _ => Err(GoeError::invalid_protocol(s)),
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolVersion::V1 => f.write_str("V1"),
            ProtocolVersion::V2 => f.write_str("V2"),
        }
    }
}

/// How the charger holds the cable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CableLockMode {
    UnlockCarFirst,
    Automatic,
    Locked,
}

impl CableLockMode {
    /// Map a numeric selection; anything from 2 upwards means locked
    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            0 => Ok(CableLockMode::UnlockCarFirst),
            1 => Ok(CableLockMode::Automatic),
            c if c >= 2 => Ok(CableLockMode::Locked),
            c => Err(GoeError::invalid_input(
                "cable_lock_mode".to_string(),
                format!("{} is not a cable lock mode", c),
            )),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            CableLockMode::UnlockCarFirst => 0,
            CableLockMode::Automatic => 1,
            CableLockMode::Locked => 2,
        }
    }
}

impl fmt::Display for CableLockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CableLockMode::UnlockCarFirst => "Unlock car first",
            CableLockMode::Automatic => "Automatic",
            CableLockMode::Locked => "Locked",
        };
        f.write_str(name)
    }
}

/// Phase switching mode (V2 only)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseMode {
    Auto,
    OnePhase,
    ThreePhase,
}

impl PhaseMode {
    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            0 => Ok(PhaseMode::Auto),
            1 => Ok(PhaseMode::OnePhase),
            2 => Ok(PhaseMode::ThreePhase),
            c => Err(GoeError::invalid_input(
                "phase_mode".to_string(),
                format!("{} is not a phase mode", c),
            )),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            PhaseMode::Auto => 0,
            PhaseMode::OnePhase => 1,
            PhaseMode::ThreePhase => 2,
        }
    }
}

impl fmt::Display for PhaseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PhaseMode::Auto => "Automatic",
            PhaseMode::OnePhase => "1 Phase",
            PhaseMode::ThreePhase => "3 Phase",
        };
        f.write_str(name)
    }
}

/// Capability interface shared by the protocol variants.
///
/// Values reaching these methods are already validated. Operations a
/// protocol does not implement fall back to the defaults, which reject.
#[async_trait::async_trait]
pub(crate) trait ChargerProtocol: Send + Sync {
    fn version(&self) -> ProtocolVersion;

    /// Status with logical field names and units
    async fn fetch_status(&self) -> Result<RawStatus>;

    async fn set_max_current(&self, amps: u8) -> Result<()>;

    async fn set_absolute_max_current(&self, amps: u8) -> Result<()>;

    async fn set_charge_limit(&self, kwh: f64) -> Result<()>;

    async fn set_cable_lock_mode(&self, _mode: CableLockMode) -> Result<()> {
        Err(GoeError::unsupported("set_cable_lock_mode", self.version()))
    }

    async fn set_phase_mode(&self, _mode: PhaseMode) -> Result<()> {
        Err(GoeError::unsupported("set_phase_mode", self.version()))
    }

    async fn set_charging_enabled(&self, enabled: bool) -> Result<()>;
}

/// Clamp a requested current into the range the charger accepts
pub fn clamp_current(amps: i64) -> u8 {
    // Bounded to 6..=32, so the cast cannot truncate
    amps.clamp(MIN_CURRENT_AMPS, MAX_CURRENT_AMPS) as u8
}

/// Clamp a requested charge limit (kWh) to be non-negative
pub fn clamp_charge_limit(kwh: f64) -> f64 {
    if kwh.is_nan() { 0.0 } else { kwh.max(0.0) }
}

/// Uniform read/write access to one charger
pub struct DeviceAdapter {
    host: String,
    correction_factor: f64,
    request_timeout: Duration,
    protocol: Box<dyn ChargerProtocol>,
    logger: StructuredLogger,
}

impl fmt::Debug for DeviceAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceAdapter")
            .field("host", &self.host)
            .field("protocol", &self.protocol.version())
            .field("correction_factor", &self.correction_factor)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl DeviceAdapter {
    /// Create an adapter for `host` speaking the API named by `protocol`.
    ///
    /// The tag is checked before any transport client is built.
    pub fn new(host: &str, protocol: &str, factory: &dyn TransportFactory) -> Result<Self> {
        let version: ProtocolVersion = protocol.parse()?;
        let logger = get_logger_with_context(
            LogContext::new("adapter")
                .with_field("host", host.to_string())
                .with_field("protocol", version.to_string()),
        );
        logger.debug(&format!("Creating charger at {} with API {}", host, version));

        let protocol: Box<dyn ChargerProtocol> = match version {
            ProtocolVersion::V1 => Box::new(V1Protocol::new(factory.v1(host)?)),
            ProtocolVersion::V2 => Box::new(V2Protocol::new(factory.v2(host)?)),
        };

        Ok(Self {
            host: host.to_string(),
            correction_factor: 1.0,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            protocol,
            logger,
        })
    }

    /// Create an adapter from a charger configuration entry
    pub fn from_config(config: &ChargerConfig, factory: &dyn TransportFactory) -> Result<Self> {
        Ok(Self::new(&config.host, &config.protocol, factory)?
            .with_correction_factor(config.effective_correction_factor())
            .with_request_timeout(config.request_timeout()))
    }

    pub fn with_correction_factor(mut self, factor: f64) -> Self {
        self.correction_factor = factor;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn protocol_version(&self) -> ProtocolVersion {
        self.protocol.version()
    }

    pub fn correction_factor(&self) -> f64 {
        self.correction_factor
    }

    /// Fetch and normalize the charger status.
    ///
    /// The snapshot is returned as-is even when its car status is the
    /// sentinel; deciding whether to trust it is up to the caller.
    pub async fn fetch_status(&self) -> Result<StatusSnapshot> {
        let raw = tokio::time::timeout(self.request_timeout, self.protocol.fetch_status())
            .await
            .map_err(|_| {
                GoeError::timeout(format!(
                    "status request to {} took longer than {}s",
                    self.host,
                    self.request_timeout.as_secs_f64()
                ))
            })??;
        let mut snapshot = StatusSnapshot::from_raw(&raw, chrono::Utc::now());
        let skipped = raw.len().saturating_sub(snapshot.len());
        if skipped > 0 {
            self.logger
                .trace(&format!("Skipped {} non-scalar status fields", skipped));
        }
        snapshot.apply_correction(self.correction_factor);
        Ok(snapshot)
    }

    /// Set the temporary max current; returns the value sent
    pub async fn set_max_current(&self, amps: i64) -> Result<u8> {
        let amps = clamp_current(amps);
        self.logger.debug(&format!("set max_current to {}", amps));
        self.protocol.set_max_current(amps).await?;
        Ok(amps)
    }

    /// Set the absolute max current; returns the value sent
    pub async fn set_absolute_max_current(&self, amps: i64) -> Result<u8> {
        let amps = clamp_current(amps);
        self.logger
            .debug(&format!("set absolute_max_current to {}", amps));
        self.protocol.set_absolute_max_current(amps).await?;
        Ok(amps)
    }

    /// Set the charge limit in kWh; returns the value sent (in kWh)
    pub async fn set_charge_limit(&self, kwh: f64) -> Result<f64> {
        if !kwh.is_finite() {
            return Err(GoeError::invalid_input(
                "charge_limit".to_string(),
                format!("{} is not a usable limit", kwh),
            ));
        }
        let kwh = clamp_charge_limit(kwh);
        self.logger.debug(&format!("set charge_limit to {}", kwh));
        self.protocol.set_charge_limit(kwh).await?;
        Ok(kwh)
    }

    pub async fn set_cable_lock_mode(&self, mode: CableLockMode) -> Result<CableLockMode> {
        self.logger.debug(&format!("set cable_lock_mode to {}", mode));
        self.protocol.set_cable_lock_mode(mode).await?;
        Ok(mode)
    }

    pub async fn set_phase_mode(&self, mode: PhaseMode) -> Result<PhaseMode> {
        self.logger.debug(&format!("set phase_mode to {}", mode));
        self.protocol.set_phase_mode(mode).await?;
        Ok(mode)
    }

    pub async fn set_charging_enabled(&self, enabled: bool) -> Result<bool> {
        self.logger
            .debug(&format!("set allow_charging to {}", enabled));
        self.protocol.set_charging_enabled(enabled).await?;
        Ok(enabled)
    }

    /// Run one write command; returns the command as actually dispatched
    pub async fn apply(&self, command: &ChargerCommand) -> Result<ChargerCommand> {
        let sent = match *command {
            ChargerCommand::SetMaxCurrent(a) => {
                ChargerCommand::SetMaxCurrent(self.set_max_current(a).await?.into())
            }
            ChargerCommand::SetAbsoluteMaxCurrent(a) => ChargerCommand::SetAbsoluteMaxCurrent(
                self.set_absolute_max_current(a).await?.into(),
            ),
            ChargerCommand::SetChargeLimit(kwh) => {
                ChargerCommand::SetChargeLimit(self.set_charge_limit(kwh).await?)
            }
            ChargerCommand::SetCableLockMode(m) => {
                ChargerCommand::SetCableLockMode(self.set_cable_lock_mode(m).await?)
            }
            ChargerCommand::SetPhaseMode(m) => {
                ChargerCommand::SetPhaseMode(self.set_phase_mode(m).await?)
            }
            ChargerCommand::SetChargingEnabled(on) => {
                ChargerCommand::SetChargingEnabled(self.set_charging_enabled(on).await?)
            }
        };
        Ok(sent)
    }
}

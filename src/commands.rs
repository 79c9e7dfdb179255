//! Write commands and their input resolution
//!
//! A [`CommandRequest`] names its target, the operation and where the value
//! comes from. References to other observables are resolved before anything
//! is validated, so the adapter only ever sees concrete typed values.

use crate::adapter::{CableLockMode, PhaseMode};
use crate::error::{GoeError, Result};
use crate::snapshot::{FieldValue, StatusSnapshot};
use std::collections::HashMap;
use std::fmt;

/// One concrete write operation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChargerCommand {
    SetMaxCurrent(i64),
    SetAbsoluteMaxCurrent(i64),
    SetChargeLimit(f64),
    SetCableLockMode(CableLockMode),
    SetPhaseMode(PhaseMode),
    SetChargingEnabled(bool),
}

impl ChargerCommand {
    pub fn kind(&self) -> CommandKind {
        match self {
            ChargerCommand::SetMaxCurrent(_) => CommandKind::MaxCurrent,
            ChargerCommand::SetAbsoluteMaxCurrent(_) => CommandKind::AbsoluteMaxCurrent,
            ChargerCommand::SetChargeLimit(_) => CommandKind::ChargeLimit,
            ChargerCommand::SetCableLockMode(_) => CommandKind::CableLockMode,
            ChargerCommand::SetPhaseMode(_) => CommandKind::PhaseMode,
            ChargerCommand::SetChargingEnabled(_) => CommandKind::ChargingEnabled,
        }
    }
}

impl fmt::Display for ChargerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = self.kind().operation();
        match self {
            ChargerCommand::SetMaxCurrent(v) | ChargerCommand::SetAbsoluteMaxCurrent(v) => {
                write!(f, "{}({})", op, v)
            }
            ChargerCommand::SetChargeLimit(v) => write!(f, "{}({})", op, v),
            ChargerCommand::SetCableLockMode(m) => write!(f, "{}({})", op, m),
            ChargerCommand::SetPhaseMode(m) => write!(f, "{}({})", op, m),
            ChargerCommand::SetChargingEnabled(v) => write!(f, "{}({})", op, v),
        }
    }
}

/// The six write operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    MaxCurrent,
    AbsoluteMaxCurrent,
    ChargeLimit,
    CableLockMode,
    PhaseMode,
    ChargingEnabled,
}

impl CommandKind {
    pub const ALL: [CommandKind; 6] = [
        CommandKind::MaxCurrent,
        CommandKind::AbsoluteMaxCurrent,
        CommandKind::ChargeLimit,
        CommandKind::CableLockMode,
        CommandKind::PhaseMode,
        CommandKind::ChargingEnabled,
    ];

    /// Operation name as exposed to callers
    pub fn operation(self) -> &'static str {
        match self {
            CommandKind::MaxCurrent => "set_max_current",
            CommandKind::AbsoluteMaxCurrent => "set_absolute_max_current",
            CommandKind::ChargeLimit => "set_charge_limit",
            CommandKind::CableLockMode => "set_cable_lock_mode",
            CommandKind::PhaseMode => "set_phase_mode",
            CommandKind::ChargingEnabled => "set_charging_enabled",
        }
    }

    /// Name of the input value, used in error messages
    pub fn input_field(self) -> &'static str {
        match self {
            CommandKind::MaxCurrent => "max_current",
            CommandKind::AbsoluteMaxCurrent => "absolute_max_current",
            CommandKind::ChargeLimit => "charge_limit",
            CommandKind::CableLockMode => "cable_lock_mode",
            CommandKind::PhaseMode => "phase_mode",
            CommandKind::ChargingEnabled => "allow_charging",
        }
    }

    /// Turn a resolved value into a typed command
    pub fn build(self, value: &FieldValue) -> Result<ChargerCommand> {
        match self {
            CommandKind::MaxCurrent => Ok(ChargerCommand::SetMaxCurrent(self.integer(value)?)),
            CommandKind::AbsoluteMaxCurrent => Ok(ChargerCommand::SetAbsoluteMaxCurrent(
                self.integer(value)?,
            )),
            CommandKind::ChargeLimit => Ok(ChargerCommand::SetChargeLimit(self.number(value)?)),
            CommandKind::CableLockMode => Ok(ChargerCommand::SetCableLockMode(
                CableLockMode::from_code(self.integer(value)?)?,
            )),
            CommandKind::PhaseMode => Ok(ChargerCommand::SetPhaseMode(PhaseMode::from_code(
                self.integer(value)?,
            )?)),
            CommandKind::ChargingEnabled => value
                .as_bool()
                .map(ChargerCommand::SetChargingEnabled)
                .ok_or_else(|| self.invalid(value)),
        }
    }

    fn number(self, value: &FieldValue) -> Result<f64> {
        value
            .as_f64()
            .filter(|n| n.is_finite())
            .ok_or_else(|| self.invalid(value))
    }

    fn integer(self, value: &FieldValue) -> Result<i64> {
        Ok(self.number(value)?.trunc() as i64)
    }

    fn invalid(self, value: &FieldValue) -> GoeError {
        GoeError::invalid_input(
            self.input_field().to_string(),
            format!("'{}' is not usable", value),
        )
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.operation())
    }
}

/// Where a command's value comes from
#[derive(Debug, Clone, PartialEq)]
pub enum CommandInput {
    /// A value given directly (numeric strings are accepted)
    Literal(FieldValue),
    /// The current value of another observable
    Reference(String),
}

/// Looks up the live value of an observable by reference
pub trait ValueResolver: Send + Sync {
    fn resolve(&self, reference: &str) -> Option<FieldValue>;
}

/// Resolver for callers that never use references
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReferences;

impl ValueResolver for NoReferences {
    fn resolve(&self, _reference: &str) -> Option<FieldValue> {
        None
    }
}

impl ValueResolver for HashMap<String, FieldValue> {
    fn resolve(&self, reference: &str) -> Option<FieldValue> {
        self.get(reference).cloned()
    }
}

/// Snapshot fields can be referenced by field name
impl ValueResolver for StatusSnapshot {
    fn resolve(&self, reference: &str) -> Option<FieldValue> {
        self.get(reference).cloned()
    }
}

/// One outbound write request
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRequest {
    /// Target charger; `None` addresses every registered charger
    pub device: Option<String>,
    pub kind: CommandKind,
    pub input: CommandInput,
}

impl CommandRequest {
    pub fn new<S: Into<String>>(device: S, kind: CommandKind, input: CommandInput) -> Self {
        Self {
            device: Some(device.into()),
            kind,
            input,
        }
    }

    pub fn for_all(kind: CommandKind, input: CommandInput) -> Self {
        Self {
            device: None,
            kind,
            input,
        }
    }

    /// Shorthand for a literal value aimed at one charger
    pub fn literal<S: Into<String>, V: Into<FieldValue>>(
        device: S,
        kind: CommandKind,
        value: V,
    ) -> Self {
        Self::new(device, kind, CommandInput::Literal(value.into()))
    }

    /// Resolve the input and build the typed command
    pub fn resolve(&self, resolver: &dyn ValueResolver) -> Result<ChargerCommand> {
        let value = match &self.input {
            CommandInput::Literal(v) => v.clone(),
            CommandInput::Reference(r) => resolver.resolve(r).ok_or_else(|| {
                GoeError::invalid_input(
                    self.kind.input_field().to_string(),
                    format!("reference '{}' has no value", r),
                )
            })?,
        };
        self.kind.build(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_numeric_strings_are_accepted() {
        let req = CommandRequest::literal("garage", CommandKind::MaxCurrent, "16");
        assert_eq!(
            req.resolve(&NoReferences).unwrap(),
            ChargerCommand::SetMaxCurrent(16)
        );
    }

    #[test]
    fn non_numeric_literal_is_rejected() {
        let req = CommandRequest::literal("garage", CommandKind::ChargeLimit, "lots");
        assert!(matches!(
            req.resolve(&NoReferences),
            Err(GoeError::InvalidCommandInput { .. })
        ));
    }

    #[test]
    fn references_resolve_before_validation() {
        let mut states = HashMap::new();
        states.insert("input_number.ev_amps".to_string(), FieldValue::from("40"));
        let req = CommandRequest::new(
            "garage",
            CommandKind::MaxCurrent,
            CommandInput::Reference("input_number.ev_amps".to_string()),
        );
        // Clamping is the adapter's job, resolution keeps the raw value
        assert_eq!(
            req.resolve(&states).unwrap(),
            ChargerCommand::SetMaxCurrent(40)
        );

        let missing = CommandRequest::new(
            "garage",
            CommandKind::MaxCurrent,
            CommandInput::Reference("input_number.absent".to_string()),
        );
        assert!(missing.resolve(&states).is_err());
    }

    #[test]
    fn mode_and_flag_inputs() {
        let lock = CommandRequest::literal("g", CommandKind::CableLockMode, 3.0);
        assert_eq!(
            lock.resolve(&NoReferences).unwrap(),
            ChargerCommand::SetCableLockMode(CableLockMode::Locked)
        );
        let phase = CommandRequest::literal("g", CommandKind::PhaseMode, 7.0);
        assert!(phase.resolve(&NoReferences).is_err());
        let allow = CommandRequest::literal("g", CommandKind::ChargingEnabled, "off");
        assert_eq!(
            allow.resolve(&NoReferences).unwrap(),
            ChargerCommand::SetChargingEnabled(false)
        );
    }

    #[test]
    fn kinds_round_trip_through_commands() {
        for kind in CommandKind::ALL {
            let value = if kind == CommandKind::ChargingEnabled {
                FieldValue::Flag(true)
            } else {
                FieldValue::Number(1.0)
            };
            assert_eq!(kind.build(&value).unwrap().kind(), kind);
        }
        assert_eq!(
            ChargerCommand::SetChargeLimit(2.5).to_string(),
            "set_charge_limit(2.5)"
        );
    }
}

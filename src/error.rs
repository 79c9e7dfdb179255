//! Error types and handling for goe-bridge
//!
//! This module defines the error types used throughout the crate. Every
//! variant carries owned strings only so the type is `Clone`: a single
//! in-flight status fetch hands the same outcome to every waiting caller.

use thiserror::Error;

/// Result type alias for goe-bridge operations
pub type Result<T> = std::result::Result<T, GoeError>;

/// Main error type for goe-bridge
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GoeError {
    /// Protocol tag other than the two supported vendor API versions
    #[error("Invalid protocol version '{value}'. Allowed values are 1 and 2")]
    InvalidProtocolVersion { value: String },

    /// Write operation not implemented by the charger's protocol version
    #[error("Operation '{operation}' is not supported on protocol {protocol}")]
    UnsupportedOnProtocol { operation: String, protocol: String },

    /// Charger unreachable or the vendor call failed
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// Transport succeeded but the payload reported an unknown car status
    #[error("Invalid status payload from charger '{device}'")]
    InvalidStatusPayload { device: String },

    /// Lookup by a device name that is not registered
    #[error("Charger with name '{name}' not found")]
    UnknownDevice { name: String },

    /// Registering a device name that is already taken
    #[error("Charger with name '{name}' is already registered")]
    DuplicateDevice { name: String },

    /// Command input could not be resolved into a typed value
    #[error("No valid value for '{field}': {message}")]
    InvalidCommandInput { field: String, message: String },

    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Status request exceeded the charger's request timeout
    #[error("Timeout error: {message}")]
    Timeout { message: String },

    /// Generic errors with context
    #[error("Error: {message}")]
    Generic { message: String },
}

impl GoeError {
    /// Create a new invalid protocol version error
    pub fn invalid_protocol<S: Into<String>>(value: S) -> Self {
        GoeError::InvalidProtocolVersion {
            value: value.into(),
        }
    }

    /// Create a new unsupported operation error
    pub fn unsupported<S: Into<String>, P: std::fmt::Display>(operation: S, protocol: P) -> Self {
        GoeError::UnsupportedOnProtocol {
            operation: operation.into(),
            protocol: protocol.to_string(),
        }
    }

    /// Create a new transport error
    pub fn transport<S: Into<String>>(message: S) -> Self {
        GoeError::Transport {
            message: message.into(),
        }
    }

    /// Create a new invalid status payload error
    pub fn invalid_payload<S: Into<String>>(device: S) -> Self {
        GoeError::InvalidStatusPayload {
            device: device.into(),
        }
    }

    /// Create a new unknown device error
    pub fn unknown_device<S: Into<String>>(name: S) -> Self {
        GoeError::UnknownDevice { name: name.into() }
    }

    /// Create a new duplicate device error
    pub fn duplicate_device<S: Into<String>>(name: S) -> Self {
        GoeError::DuplicateDevice { name: name.into() }
    }

    /// Create a new command input error
    pub fn invalid_input<S: Into<String>>(field: S, message: S) -> Self {
        GoeError::InvalidCommandInput {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        GoeError::Config {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        GoeError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        GoeError::Io {
            message: message.into(),
        }
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        GoeError::Timeout {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn generic<S: Into<String>>(message: S) -> Self {
        GoeError::Generic {
            message: message.into(),
        }
    }

    /// Whether the error means the charger could not be reached or read
    pub fn is_fetch_failure(&self) -> bool {
        matches!(
            self,
            GoeError::Transport { .. } | GoeError::Timeout { .. } | GoeError::InvalidStatusPayload { .. }
        )
    }
}

impl From<std::io::Error> for GoeError {
    fn from(err: std::io::Error) -> Self {
        GoeError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for GoeError {
    fn from(err: serde_yaml::Error) -> Self {
        GoeError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for GoeError {
    fn from(err: serde_json::Error) -> Self {
        GoeError::Serialization {
            message: err.to_string(),
        }
    }
}

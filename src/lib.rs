//! # goe-bridge - polling and command bridge for go-e EV chargers
//!
//! Keeps an up-to-date view of each configured go-e charger and routes
//! write commands to it, regardless of which of the two vendor API
//! versions the charger speaks.
//!
//! ## Architecture
//!
//! - `transport`: traits for the vendor HTTP clients, supplied by the host
//! - `adapter`: one read/write contract over both API versions
//! - `snapshot`: normalized status values
//! - `coordinator`: cached snapshot, periodic polling and single-flight refresh
//! - `catalog`: registry of chargers by name
//! - `commands`: write requests and input resolution
//! - `config`: YAML configuration and validation
//! - `logging`: structured logging and tracing

pub mod adapter;
pub mod catalog;
pub mod commands;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod logging;
pub mod snapshot;
pub mod transport;

// Re-export commonly used types
pub use adapter::{CableLockMode, DeviceAdapter, PhaseMode, ProtocolVersion};
pub use catalog::{ChargerCatalog, ChargerHandle};
pub use commands::{ChargerCommand, CommandInput, CommandKind, CommandRequest, ValueResolver};
pub use config::{ChargerConfig, Config};
pub use coordinator::RefreshCoordinator;
pub use error::{GoeError, Result};
pub use snapshot::{FieldValue, StatusSnapshot};
pub use transport::{TransportFactory, V1Transport, V2Transport};

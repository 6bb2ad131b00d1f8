//! Shared types for the gesture-switch workspace.
//!
//! Everything the daemon (`gestured`) and the operator CLI (`gesturectl`)
//! agree on lives here: device/command value types, the error taxonomy,
//! the bus topic protocol, and configuration loading.

pub mod config;
pub mod error;
pub mod protocol;
pub mod types;

pub use config::{AppConfig, BusConfig, PipelineConfig};
pub use error::GestureError;
pub use types::{
    Command, CommandSource, DeviceId, DeviceState, DeviceStatus, Provenance, StatusReport,
    SwitchAction,
};

/// Version of the workspace, stamped into logs at startup.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

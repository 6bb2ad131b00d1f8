//! Core value types shared by the daemon and the CLI.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a switchable device, valid range 1..=5.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DeviceId(u8);

impl DeviceId {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    /// Returns `None` for ids outside 1..=5.
    pub fn new(id: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&id).then_some(Self(id))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// All known device ids in ascending order.
    pub fn all() -> impl Iterator<Item = DeviceId> {
        (Self::MIN..=Self::MAX).map(DeviceId)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a command asks a device to do. Wire payloads are `ON` / `OFF`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwitchAction {
    On,
    Off,
}

impl SwitchAction {
    pub fn as_payload(self) -> &'static str {
        match self {
            SwitchAction::On => "ON",
            SwitchAction::Off => "OFF",
        }
    }

    /// Parses a bus payload. Anything but the exact `ON` / `OFF` strings is
    /// rejected; the caller decides whether that is worth a warning.
    pub fn from_payload(payload: &str) -> Option<Self> {
        match payload {
            "ON" => Some(SwitchAction::On),
            "OFF" => Some(SwitchAction::Off),
            _ => None,
        }
    }
}

impl fmt::Display for SwitchAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_payload())
    }
}

/// Where a locally issued command came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandSource {
    Gesture,
    UserToggle,
}

/// Who last changed a device's recorded state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Provenance {
    Gesture,
    UserToggle,
    RemoteReport,
}

impl From<CommandSource> for Provenance {
    fn from(source: CommandSource) -> Self {
        match source {
            CommandSource::Gesture => Provenance::Gesture,
            CommandSource::UserToggle => Provenance::UserToggle,
        }
    }
}

/// A locally issued device command. Immutable value type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub device: DeviceId,
    pub action: SwitchAction,
    pub source: CommandSource,
    pub issued_at: DateTime<Utc>,
}

impl Command {
    pub fn new(device: DeviceId, action: SwitchAction, source: CommandSource) -> Self {
        Self {
            device,
            action,
            source,
            issued_at: Utc::now(),
        }
    }
}

/// Last-known state of a device as seen from this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceStatus {
    /// No status report received since startup.
    Unknown,
    On,
    Off,
}

impl From<SwitchAction> for DeviceStatus {
    fn from(action: SwitchAction) -> Self {
        match action {
            SwitchAction::On => DeviceStatus::On,
            SwitchAction::Off => DeviceStatus::Off,
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceStatus::Unknown => f.write_str("UNKNOWN"),
            DeviceStatus::On => f.write_str("ON"),
            DeviceStatus::Off => f.write_str("OFF"),
        }
    }
}

/// Authoritative per-device record. One instance per device id for the
/// lifetime of the process; `version` is non-decreasing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceState {
    pub device: DeviceId,
    pub status: DeviceStatus,
    pub last_updated_by: Option<Provenance>,
    pub version: u64,
}

impl DeviceState {
    /// Startup state: nothing reported yet.
    pub fn unknown(device: DeviceId) -> Self {
        Self {
            device,
            status: DeviceStatus::Unknown,
            last_updated_by: None,
            version: 0,
        }
    }
}

/// An inbound device status report. The wire payload carries no version;
/// the bus adapter stamps each report with a process-monotonic sequence so
/// reordered or replayed deliveries can be rejected as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusReport {
    pub device: DeviceId,
    pub status: SwitchAction,
    pub version: u64,
}

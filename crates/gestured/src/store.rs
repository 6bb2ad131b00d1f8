//! Device state store.
//!
//! The single in-process record of each device's last-known state. All
//! five devices exist for the lifetime of the process, starting `Unknown`
//! until the first status report lands. Mutation happens only through
//! `apply`, and only the sync controller task holds the store, which is
//! the serialization boundary the whole design leans on.

use std::collections::HashMap;

use tracing::debug;

use gesture_common::{DeviceId, DeviceState, DeviceStatus, Provenance, StatusReport};

#[derive(Debug)]
pub struct DeviceStateStore {
    states: HashMap<DeviceId, DeviceState>,
}

impl DeviceStateStore {
    pub fn new() -> Self {
        let states = DeviceId::all()
            .map(|device| (device, DeviceState::unknown(device)))
            .collect();
        Self { states }
    }

    pub fn get(&self, device: DeviceId) -> &DeviceState {
        // Every valid DeviceId is seeded in new(), so this cannot miss.
        &self.states[&device]
    }

    /// All device states in id order, for status queries and tests.
    pub fn snapshot(&self) -> Vec<DeviceState> {
        DeviceId::all().map(|d| self.states[&d].clone()).collect()
    }

    /// Applies an inbound status report. A report whose version is not
    /// newer than the stored one is dropped as stale (expected under
    /// reordering, so only debug-logged). Returns whether the externally
    /// observable status actually changed; version and provenance advance
    /// on every accepted report either way.
    pub fn apply(&mut self, report: &StatusReport, updated_by: Provenance) -> bool {
        let state = self
            .states
            .get_mut(&report.device)
            .expect("all device ids are seeded at startup");

        if report.version <= state.version {
            debug!(
                device = %report.device,
                stored = state.version,
                received = report.version,
                "stale report dropped"
            );
            return false;
        }

        let new_status = DeviceStatus::from(report.status);
        let changed = state.status != new_status;
        state.status = new_status;
        state.version = report.version;
        state.last_updated_by = Some(updated_by);
        changed
    }
}

impl Default for DeviceStateStore {
    fn default() -> Self {
        Self::new()
    }
}

//! Pending-intent ledger.
//!
//! Tracks the most recent locally issued command per device until a
//! matching status report confirms it, a newer local command supersedes
//! it, or its deadline passes. This is what lets the sync controller tell
//! "the device did what we asked" apart from "someone else flipped it".
//!
//! Invariant: at most one entry per device; `record` overwrites, it never
//! queues. Expiry is time-based so it survives the capture loop stopping.

use std::collections::HashMap;

use tokio::time::{Duration, Instant};
use tracing::debug;

use gesture_common::{Command, DeviceId, SwitchAction};

#[derive(Debug, Clone)]
pub struct PendingIntent {
    pub command: Command,
    pub deadline: Instant,
}

#[derive(Debug)]
pub struct PendingIntentLedger {
    ttl: Duration,
    entries: HashMap<DeviceId, PendingIntent>,
}

impl PendingIntentLedger {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Records a new local intent, superseding any prior entry for the
    /// same device.
    pub fn record(&mut self, command: Command, now: Instant) {
        let device = command.device;
        let previous = self.entries.insert(
            device,
            PendingIntent {
                command,
                deadline: now + self.ttl,
            },
        );
        if previous.is_some() {
            debug!(%device, "pending intent superseded");
        }
    }

    /// Tries to confirm an intent with an inbound status report. Returns
    /// the confirmed command only when the action matches and the deadline
    /// has not passed; a mismatching report leaves the entry in place.
    pub fn confirm(
        &mut self,
        device: DeviceId,
        action: SwitchAction,
        now: Instant,
    ) -> Option<Command> {
        let intent = self.entries.get(&device)?;
        if now > intent.deadline {
            // Overdue; leave removal to the sweep so this path stays simple.
            return None;
        }
        if intent.command.action != action {
            return None;
        }
        self.entries.remove(&device).map(|i| i.command)
    }

    /// Removes every intent whose deadline has passed and returns the
    /// affected devices. Called from the controller's periodic tick.
    pub fn expire_overdue(&mut self, now: Instant) -> Vec<DeviceId> {
        let expired: Vec<DeviceId> = self
            .entries
            .iter()
            .filter(|(_, intent)| now > intent.deadline)
            .map(|(device, _)| *device)
            .collect();
        for device in &expired {
            self.entries.remove(device);
        }
        expired
    }

    pub fn pending(&self, device: DeviceId) -> Option<&PendingIntent> {
        self.entries.get(&device)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gesture_common::CommandSource;

    fn dev(n: u8) -> DeviceId {
        DeviceId::new(n).unwrap()
    }

    fn cmd(n: u8, action: SwitchAction) -> Command {
        Command::new(dev(n), action, CommandSource::Gesture)
    }

    #[test]
    fn record_overwrites_instead_of_queueing() {
        let mut ledger = PendingIntentLedger::new(Duration::from_secs(5));
        let now = Instant::now();

        ledger.record(cmd(2, SwitchAction::On), now);
        ledger.record(cmd(2, SwitchAction::Off), now + Duration::from_millis(10));

        assert_eq!(ledger.len(), 1);
        let pending = ledger.pending(dev(2)).unwrap();
        assert_eq!(pending.command.action, SwitchAction::Off);
    }

    #[test]
    fn matching_report_confirms_and_clears() {
        let mut ledger = PendingIntentLedger::new(Duration::from_secs(5));
        let now = Instant::now();

        ledger.record(cmd(2, SwitchAction::On), now);
        let confirmed = ledger
            .confirm(dev(2), SwitchAction::On, now + Duration::from_secs(1))
            .unwrap();
        assert_eq!(confirmed.device, dev(2));
        assert!(ledger.is_empty());
    }

    #[test]
    fn mismatching_report_leaves_the_intent() {
        let mut ledger = PendingIntentLedger::new(Duration::from_secs(5));
        let now = Instant::now();

        ledger.record(cmd(4, SwitchAction::On), now);
        assert!(ledger.confirm(dev(4), SwitchAction::Off, now).is_none());
        assert!(ledger.pending(dev(4)).is_some());
    }

    #[test]
    fn overdue_intent_does_not_confirm() {
        let mut ledger = PendingIntentLedger::new(Duration::from_secs(5));
        let now = Instant::now();

        ledger.record(cmd(1, SwitchAction::On), now);
        let late = now + Duration::from_secs(6);
        assert!(ledger.confirm(dev(1), SwitchAction::On, late).is_none());
    }

    #[test]
    fn sweep_removes_only_overdue_entries() {
        let mut ledger = PendingIntentLedger::new(Duration::from_secs(5));
        let now = Instant::now();

        ledger.record(cmd(1, SwitchAction::On), now);
        ledger.record(cmd(3, SwitchAction::Off), now + Duration::from_secs(4));

        let expired = ledger.expire_overdue(now + Duration::from_secs(6));
        assert_eq!(expired, vec![dev(1)]);
        assert!(ledger.pending(dev(1)).is_none());
        assert!(ledger.pending(dev(3)).is_some());
    }
}

//! State-sync controller.
//!
//! An actor task that exclusively owns the [`DeviceStateStore`] and the
//! [`PendingIntentLedger`]. The capture path and the bus transport never
//! touch either directly; they send [`SyncMessage`]s through a
//! [`SyncHandle`]. That single mailbox is the serialization point between
//! the periodic capture tick and the asynchronous bus deliveries.
//!
//! The controller performs no bus I/O of its own, so a status report can
//! never fan back out into a publish — report→publish→report cycles are
//! impossible by construction.

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use gesture_common::{
    protocol::{self, InboundTopic},
    Command, DeviceId, DeviceState, DeviceStatus, Provenance, StatusReport, SwitchAction,
};

use crate::ledger::PendingIntentLedger;
use crate::store::DeviceStateStore;

/// Capacity of the state-change broadcast; a slow observer loses old
/// notifications, never blocks the controller.
const NOTIFY_CAPACITY: usize = 64;

/// Messages accepted by the controller mailbox.
#[derive(Debug)]
pub enum SyncMessage {
    /// Raw inbound bus delivery, already stamped with a report sequence.
    Inbound {
        topic: String,
        payload: Vec<u8>,
        version: u64,
    },
    /// A locally issued command that is now awaiting confirmation.
    RecordIntent(Command),
    /// Request for a copy of all device states.
    Snapshot(oneshot::Sender<Vec<DeviceState>>),
}

/// Notification sent to observers whenever a device's visible state
/// actually changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub device: DeviceId,
    pub status: DeviceStatus,
}

/// Cloneable handle for talking to the controller. This is the whole
/// surface the presentation layer gets: submit intent, feed inbound
/// traffic, snapshot, subscribe.
#[derive(Debug, Clone)]
pub struct SyncHandle {
    tx: mpsc::UnboundedSender<SyncMessage>,
    notify: broadcast::Sender<StateChange>,
}

impl SyncHandle {
    pub fn record_intent(&self, command: Command) {
        if self.tx.send(SyncMessage::RecordIntent(command)).is_err() {
            warn!("sync controller is gone, intent dropped");
        }
    }

    pub fn inbound(&self, topic: String, payload: Vec<u8>, version: u64) {
        let message = SyncMessage::Inbound {
            topic,
            payload,
            version,
        };
        if self.tx.send(message).is_err() {
            warn!("sync controller is gone, inbound message dropped");
        }
    }

    /// Current state of all devices.
    pub async fn snapshot(&self) -> Vec<DeviceState> {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(SyncMessage::Snapshot(reply)).is_err() {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    /// Subscribes to state-change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.notify.subscribe()
    }
}

/// Owns store + ledger and reconciles the three sources of truth.
pub struct StateSyncController {
    store: DeviceStateStore,
    ledger: PendingIntentLedger,
    rx: mpsc::UnboundedReceiver<SyncMessage>,
    notify: broadcast::Sender<StateChange>,
    sweep_interval: Duration,
}

impl StateSyncController {
    /// Builds a controller and its handle. `intent_ttl` bounds how long a
    /// local command waits for confirmation; `sweep_interval` is how often
    /// overdue intents are expired.
    pub fn new(intent_ttl: Duration, sweep_interval: Duration) -> (Self, SyncHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (notify, _) = broadcast::channel(NOTIFY_CAPACITY);
        let controller = Self {
            store: DeviceStateStore::new(),
            ledger: PendingIntentLedger::new(intent_ttl),
            rx,
            notify: notify.clone(),
            sweep_interval,
        };
        (controller, SyncHandle { tx, notify })
    }

    /// Runs until every handle is dropped. The expiry sweep ticks on its
    /// own schedule regardless of inbound traffic, so a lost device report
    /// cannot wedge the ledger forever.
    pub async fn run(mut self) {
        let mut sweep = interval(self.sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("state-sync controller running");

        loop {
            tokio::select! {
                message = self.rx.recv() => match message {
                    Some(message) => self.handle(message, Instant::now()),
                    None => {
                        info!("all sync handles dropped, controller stopping");
                        break;
                    }
                },
                tick = sweep.tick() => {
                    for device in self.ledger.expire_overdue(tick) {
                        warn!(%device, "pending intent expired unconfirmed");
                    }
                }
            }
        }
    }

    fn handle(&mut self, message: SyncMessage, now: Instant) {
        match message {
            SyncMessage::Inbound {
                topic,
                payload,
                version,
            } => self.handle_inbound(&topic, &payload, version, now),
            SyncMessage::RecordIntent(command) => self.ledger.record(command, now),
            SyncMessage::Snapshot(reply) => {
                let _ = reply.send(self.store.snapshot());
            }
        }
    }

    fn handle_inbound(&mut self, topic: &str, payload: &[u8], version: u64, now: Instant) {
        let device = match protocol::parse_topic(topic) {
            // Bare LED{n} is our own outbound channel, not the truth channel.
            Some(InboundTopic::Command(_)) => return,
            Some(InboundTopic::Status(device)) => device,
            None => {
                debug!(topic, "ignoring message on foreign topic");
                return;
            }
        };

        let payload = String::from_utf8_lossy(payload);
        let Some(status) = SwitchAction::from_payload(&payload) else {
            warn!(topic, %payload, "malformed status payload");
            return;
        };

        // A matching pending intent means this report is the device
        // honoring our own command; credit the original source. Anything
        // else is an externally originated change.
        let updated_by = match self.ledger.confirm(device, status, now) {
            Some(intent) => Provenance::from(intent.source),
            None => Provenance::RemoteReport,
        };

        let report = StatusReport {
            device,
            status,
            version,
        };
        if self.store.apply(&report, updated_by) {
            let change = StateChange {
                device,
                status: report.status.into(),
            };
            info!(device = %change.device, status = %change.status, ?updated_by, "device state changed");
            // No receivers is fine; observers are optional.
            let _ = self.notify.send(change);
        }
    }
}

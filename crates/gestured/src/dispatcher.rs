//! Command dispatch: debounced commands out to the bus.
//!
//! The dispatcher records the command as pending local intent *before*
//! publishing, so a status report racing back cannot be misread as an
//! external change. It never touches device state itself — only the sync
//! controller advances authoritative state, and only on confirmation.

use std::sync::Arc;

use tracing::warn;

use gesture_common::{protocol, Command, CommandSource, DeviceId, GestureError, SwitchAction};

use crate::sync::SyncHandle;

/// Outbound side of the bus. Publishing must not block on network I/O;
/// implementations hand the message to the transport and return.
pub trait CommandBus: Send + Sync {
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), GestureError>;
}

pub struct CommandDispatcher {
    bus: Arc<dyn CommandBus>,
    sync: SyncHandle,
}

impl CommandDispatcher {
    pub fn new(bus: Arc<dyn CommandBus>, sync: SyncHandle) -> Self {
        Self { bus, sync }
    }

    /// Dispatches a command: ledger first, then the bus. A publish failure
    /// is reported but the intent stays recorded — a later device report
    /// (or expiry) reconciles it.
    pub fn dispatch(&self, command: Command) -> Result<(), GestureError> {
        self.sync.record_intent(command.clone());

        let topic = protocol::command_topic(command.device);
        self.bus
            .publish(&topic, command.action.as_payload().as_bytes())
            .map_err(|e| {
                warn!(
                    device = %command.device,
                    action = %command.action,
                    error = %e,
                    "publish failed, intent kept for reconciliation"
                );
                e
            })
    }

    /// Entry point for user-initiated toggles. Same contract as gesture
    /// commands; only the debouncer is skipped, since it exists to tame
    /// the frame cadence, not deliberate clicks.
    pub fn dispatch_user_toggle(
        &self,
        device: DeviceId,
        action: SwitchAction,
    ) -> Result<(), GestureError> {
        self.dispatch(Command::new(device, action, CommandSource::UserToggle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::time::Duration;

    use crate::sync::StateSyncController;

    /// Records publishes; fails on demand.
    pub struct RecordingBus {
        pub published: Mutex<Vec<(String, String)>>,
        pub fail: Mutex<bool>,
    }

    impl RecordingBus {
        pub fn new() -> Arc<Self> {
            Arc::new(Self {
                published: Mutex::new(Vec::new()),
                fail: Mutex::new(false),
            })
        }
    }

    impl CommandBus for RecordingBus {
        fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), GestureError> {
            if *self.fail.lock().unwrap() {
                return Err(GestureError::BusPublish("transport down".to_string()));
            }
            self.published
                .lock()
                .unwrap()
                .push((topic.to_string(), String::from_utf8_lossy(payload).into()));
            Ok(())
        }
    }

    fn dev(n: u8) -> DeviceId {
        DeviceId::new(n).unwrap()
    }

    #[tokio::test]
    async fn publishes_on_the_command_topic() {
        let (controller, handle) =
            StateSyncController::new(Duration::from_secs(5), Duration::from_secs(1));
        tokio::spawn(controller.run());

        let bus = RecordingBus::new();
        let dispatcher = CommandDispatcher::new(bus.clone(), handle);
        dispatcher.dispatch_user_toggle(dev(3), SwitchAction::On).unwrap();

        let published = bus.published.lock().unwrap();
        assert_eq!(published.as_slice(), &[("LED3".to_string(), "ON".to_string())]);
    }

    #[tokio::test]
    async fn publish_failure_is_nonfatal_and_intent_survives() {
        let (controller, handle) =
            StateSyncController::new(Duration::from_secs(5), Duration::from_secs(1));
        tokio::spawn(controller.run());

        let bus = RecordingBus::new();
        *bus.fail.lock().unwrap() = true;
        let dispatcher = CommandDispatcher::new(bus.clone(), handle.clone());

        let err = dispatcher
            .dispatch_user_toggle(dev(2), SwitchAction::Off)
            .unwrap_err();
        assert!(matches!(err, GestureError::BusPublish(_)));

        // The intent was recorded before the publish attempt: a status
        // report arriving later still confirms with UserToggle provenance.
        handle.inbound("LED2/status".to_string(), b"OFF".to_vec(), 1);
        tokio::task::yield_now().await;
        let snapshot = handle.snapshot().await;
        let state = snapshot.iter().find(|s| s.device == dev(2)).unwrap();
        assert_eq!(
            state.last_updated_by,
            Some(gesture_common::Provenance::UserToggle)
        );
    }
}

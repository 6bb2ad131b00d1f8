//! Control-loop integration tests.
//!
//! Exercises the full local path — pipeline tick → debounce → dispatch →
//! pending intent → status report → state store — with a scripted frame
//! source and a recording bus double. Timing-sensitive cases (intent
//! expiry) run on tokio's paused clock.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::time::{advance, Duration, Instant};

use gesture_common::{
    CommandSource, DeviceId, DeviceState, DeviceStatus, GestureError, Provenance, SwitchAction,
};
use gestured::classifier::{GestureClassifier, GestureModel, KeypointVector, ModelClass, FEATURE_LEN};
use gestured::debounce::CommandDebouncer;
use gestured::dispatcher::{CommandBus, CommandDispatcher};
use gestured::pipeline::{Frame, FrameSource, GesturePipeline, LandmarkExtractor};
use gestured::sync::{StateSyncController, SyncHandle};

fn dev(n: u8) -> DeviceId {
    DeviceId::new(n).unwrap()
}

/// Bus double that records every publish.
struct RecordingBus {
    published: Mutex<Vec<(String, String)>>,
}

impl RecordingBus {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            published: Mutex::new(Vec::new()),
        })
    }

    fn published(&self) -> Vec<(String, String)> {
        self.published.lock().unwrap().clone()
    }
}

impl CommandBus for RecordingBus {
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), GestureError> {
        self.published.lock().unwrap().push((
            topic.to_string(),
            String::from_utf8_lossy(payload).into_owned(),
        ));
        Ok(())
    }
}

struct ScriptedSource {
    frames: VecDeque<Frame>,
}

impl FrameSource for ScriptedSource {
    fn grab(&mut self) -> Result<Option<Frame>, GestureError> {
        Ok(self.frames.pop_front())
    }
}

/// Every non-empty frame becomes the same all-ones keypoint vector.
struct OnesExtractor;

impl LandmarkExtractor for OnesExtractor {
    fn extract(&mut self, _frame: &Frame) -> Option<KeypointVector> {
        Some(KeypointVector::new(vec![1.0; FEATURE_LEN]))
    }
}

fn model_for(label: &str) -> GestureModel {
    GestureModel {
        version: "it".to_string(),
        feature_len: FEATURE_LEN,
        threshold: 0.0,
        classes: vec![ModelClass {
            label: label.to_string(),
            weights: vec![0.1; FEATURE_LEN],
            bias: 0.0,
        }],
    }
}

fn spawn_controller() -> SyncHandle {
    let (controller, handle) =
        StateSyncController::new(Duration::from_secs(5), Duration::from_millis(100));
    tokio::spawn(controller.run());
    handle
}

async fn state_of(sync: &SyncHandle, device: DeviceId) -> DeviceState {
    sync.snapshot()
        .await
        .into_iter()
        .find(|s| s.device == device)
        .unwrap()
}

/// Lets the controller drain its mailbox.
async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn held_gesture_publishes_once_and_confirms_as_gesture() {
    let sync = spawn_controller();
    let bus = RecordingBus::new();
    let dispatcher = CommandDispatcher::new(bus.clone(), sync.clone());

    let frames = (0..3)
        .map(|_| Frame { data: vec![1] })
        .collect::<VecDeque<_>>();
    let mut pipeline = GesturePipeline::new(
        ScriptedSource { frames },
        OnesExtractor,
        GestureClassifier::new(model_for("on_device_2")),
        CommandDebouncer::new(Duration::from_millis(1000)),
        dispatcher,
        Duration::from_millis(30),
    );

    // Three consecutive 30 ms ticks with the same confident gesture.
    let start = Instant::now();
    for i in 0..3u64 {
        pipeline
            .process_frame(start + Duration::from_millis(30 * i))
            .unwrap();
    }

    assert_eq!(
        bus.published(),
        vec![("LED2".to_string(), "ON".to_string())],
        "exactly one publish for a held gesture"
    );

    // The device honors the command and reports back.
    sync.inbound("LED2/status".to_string(), b"ON".to_vec(), 1);
    settle().await;

    let state = state_of(&sync, dev(2)).await;
    assert_eq!(state.status, DeviceStatus::On);
    assert_eq!(state.last_updated_by, Some(Provenance::Gesture));
}

#[tokio::test]
async fn confirmation_does_not_republish() {
    let sync = spawn_controller();
    let bus = RecordingBus::new();
    let dispatcher = CommandDispatcher::new(bus.clone(), sync.clone());

    dispatcher.dispatch_user_toggle(dev(2), SwitchAction::On).unwrap();
    settle().await;
    sync.inbound("LED2/status".to_string(), b"ON".to_vec(), 1);
    settle().await;

    // One outbound publish total: the confirmation must not echo back out.
    assert_eq!(bus.published().len(), 1);
    let state = state_of(&sync, dev(2)).await;
    assert_eq!(state.last_updated_by, Some(Provenance::UserToggle));

    // The intent is cleared: a second identical report is a remote report,
    // not another confirmation.
    sync.inbound("LED2/status".to_string(), b"ON".to_vec(), 2);
    settle().await;
    let state = state_of(&sync, dev(2)).await;
    assert_eq!(state.last_updated_by, Some(Provenance::RemoteReport));
}

#[tokio::test(start_paused = true)]
async fn unconfirmed_intent_expires_and_later_reports_are_remote() {
    let sync = spawn_controller();
    let bus = RecordingBus::new();
    let dispatcher = CommandDispatcher::new(bus.clone(), sync.clone());

    dispatcher.dispatch_user_toggle(dev(4), SwitchAction::On).unwrap();
    settle().await;

    // No report arrives inside the 5 s deadline; the periodic sweep must
    // clear the intent even though the capture loop never ticks.
    advance(Duration::from_secs(6)).await;
    settle().await;

    sync.inbound("LED4/status".to_string(), b"ON".to_vec(), 1);
    settle().await;

    let state = state_of(&sync, dev(4)).await;
    assert_eq!(state.status, DeviceStatus::On);
    assert_eq!(
        state.last_updated_by,
        Some(Provenance::RemoteReport),
        "an expired intent must not be credited"
    );
}

#[tokio::test]
async fn external_flip_reaches_observers() {
    let sync = spawn_controller();
    let mut changes = sync.subscribe();

    sync.inbound("LED5/status".to_string(), b"ON".to_vec(), 1);
    settle().await;
    sync.inbound("LED5/status".to_string(), b"OFF".to_vec(), 2);
    settle().await;

    let first = changes.recv().await.unwrap();
    assert_eq!((first.device, first.status), (dev(5), DeviceStatus::On));
    let second = changes.recv().await.unwrap();
    assert_eq!((second.device, second.status), (dev(5), DeviceStatus::Off));
}

#[tokio::test]
async fn superseded_intent_uses_the_newest_command() {
    let sync = spawn_controller();
    let bus = RecordingBus::new();
    let dispatcher = CommandDispatcher::new(bus.clone(), sync.clone());

    // ON then OFF before any report: the OFF intent wins, it never queues.
    dispatcher.dispatch_user_toggle(dev(1), SwitchAction::On).unwrap();
    dispatcher.dispatch_user_toggle(dev(1), SwitchAction::Off).unwrap();
    settle().await;

    // An ON report now mismatches the pending OFF intent.
    sync.inbound("LED1/status".to_string(), b"ON".to_vec(), 1);
    settle().await;
    let state = state_of(&sync, dev(1)).await;
    assert_eq!(state.last_updated_by, Some(Provenance::RemoteReport));

    // The OFF report confirms.
    sync.inbound("LED1/status".to_string(), b"OFF".to_vec(), 2);
    settle().await;
    let state = state_of(&sync, dev(1)).await;
    assert_eq!(state.status, DeviceStatus::Off);
    assert_eq!(state.last_updated_by, Some(Provenance::UserToggle));
}

#[tokio::test]
async fn gesture_and_user_paths_share_one_dispatch_contract() {
    let sync = spawn_controller();
    let bus = RecordingBus::new();
    let dispatcher = CommandDispatcher::new(bus.clone(), sync.clone());

    dispatcher
        .dispatch(gesture_common::Command::new(
            dev(3),
            SwitchAction::On,
            CommandSource::Gesture,
        ))
        .unwrap();
    dispatcher.dispatch_user_toggle(dev(3), SwitchAction::Off).unwrap();

    assert_eq!(
        bus.published(),
        vec![
            ("LED3".to_string(), "ON".to_string()),
            ("LED3".to_string(), "OFF".to_string()),
        ]
    );
}

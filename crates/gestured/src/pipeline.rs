//! Capture-and-classify loop.
//!
//! Drives the frame → landmark → label → command path on a fixed tick
//! (default 30 ms). At most one frame is in flight: a source that cannot
//! produce in time simply yields nothing and the tick is dropped, keeping
//! memory and latency bounded. Per-frame failures are recovered — a bad
//! frame is skipped, never fatal.

use tokio::time::{interval, Duration, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use gesture_common::{Command, CommandSource, GestureError};

use crate::classifier::{GestureClassifier, KeypointVector};
use crate::debounce::CommandDebouncer;
use crate::decoder;
use crate::dispatcher::CommandDispatcher;

/// One captured camera frame, opaque to the core.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
}

/// Frame acquisition boundary. `Ok(None)` means no frame was ready this
/// tick; `CameraUnavailable` means the source is gone.
pub trait FrameSource: Send {
    fn grab(&mut self) -> Result<Option<Frame>, GestureError>;
}

/// Landmark extraction boundary. Opaque collaborator: zero or one hands,
/// and whatever it returns is fed to the classifier unchanged.
pub trait LandmarkExtractor: Send {
    fn extract(&mut self, frame: &Frame) -> Option<KeypointVector>;
}

pub struct GesturePipeline<S, E> {
    source: S,
    extractor: E,
    classifier: GestureClassifier,
    debouncer: CommandDebouncer,
    dispatcher: CommandDispatcher,
    tick_interval: Duration,
}

impl<S: FrameSource, E: LandmarkExtractor> GesturePipeline<S, E> {
    pub fn new(
        source: S,
        extractor: E,
        classifier: GestureClassifier,
        debouncer: CommandDebouncer,
        dispatcher: CommandDispatcher,
        tick_interval: Duration,
    ) -> Self {
        Self {
            source,
            extractor,
            classifier,
            debouncer,
            dispatcher,
            tick_interval,
        }
    }

    /// Processes one tick. Returns the command dispatched this tick, if
    /// any. Everything short of losing the camera is absorbed here.
    pub fn process_frame(&mut self, now: Instant) -> Result<Option<Command>, GestureError> {
        let Some(frame) = self.source.grab()? else {
            return Ok(None);
        };
        let Some(vector) = self.extractor.extract(&frame) else {
            // No hand this frame.
            return Ok(None);
        };

        let label = match self.classifier.classify(&vector) {
            Ok(Some(label)) => label,
            Ok(None) => return Ok(None),
            Err(e @ GestureError::InvalidFeatureShape { .. }) => {
                warn!(error = %e, "skipping frame");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let (device, action) = match decoder::decode(label.as_str()) {
            Ok(decoded) => decoded,
            Err(e) => {
                debug!(error = %e, "label outside vocabulary, no command");
                return Ok(None);
            }
        };

        if !self.debouncer.admit(device, action, now) {
            return Ok(None);
        }

        let command = Command::new(device, action, CommandSource::Gesture);
        match self.dispatcher.dispatch(command.clone()) {
            Ok(()) => Ok(Some(command)),
            // Intent is already recorded; reconciliation or expiry will
            // sort it out. The loop keeps running.
            Err(GestureError::BusPublish(_)) => Ok(Some(command)),
            Err(e) => Err(e),
        }
    }

    /// Runs the capture loop until the frame source disappears. Safe to
    /// abort at any tick boundary; pending intents expire on their own
    /// clock, not this loop's.
    pub async fn run(mut self) {
        let mut ticks = interval(self.tick_interval);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            tick_ms = self.tick_interval.as_millis() as u64,
            model = %self.classifier.model_version(),
            "capture pipeline running"
        );

        loop {
            let tick = ticks.tick().await;
            match self.process_frame(tick) {
                Ok(_) => {}
                Err(GestureError::CameraUnavailable(reason)) => {
                    warn!(%reason, "camera unavailable, capture loop going idle");
                    break;
                }
                Err(e) => {
                    // Per-frame recovery: log and keep ticking.
                    error!(error = %e, "frame processing failed");
                }
            }
        }
    }
}

//! Landmark feed: frames from an external extraction sidecar.
//!
//! Landmark extraction itself is an external capability (the reference
//! deployment runs a MediaPipe sidecar). The sidecar writes one JSON
//! record per processed camera frame — `{"landmarks": [f32, ...]}` or
//! `{"landmarks": null}` when no hand was detected — to a FIFO. A reader
//! thread tails that FIFO into a channel; the pipeline drains the channel
//! to the newest record on each tick, so a fast sidecar never builds a
//! backlog and at most one frame is in flight.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use serde::Deserialize;
use tracing::{debug, info, warn};

use gesture_common::GestureError;

use crate::classifier::KeypointVector;
use crate::pipeline::{Frame, FrameSource, LandmarkExtractor};

/// One sidecar record.
#[derive(Debug, Deserialize)]
struct FeedRecord {
    landmarks: Option<Vec<f32>>,
}

/// `FrameSource` over the reader channel. Drains to the newest record so
/// stale frames are dropped, not queued.
#[derive(Debug)]
pub struct ChannelSource {
    rx: Receiver<Frame>,
}

impl FrameSource for ChannelSource {
    fn grab(&mut self) -> Result<Option<Frame>, GestureError> {
        let mut latest = None;
        loop {
            match self.rx.try_recv() {
                Ok(frame) => latest = Some(frame),
                Err(TryRecvError::Empty) => return Ok(latest),
                Err(TryRecvError::Disconnected) => {
                    return match latest {
                        // Deliver what we have; the loss surfaces next tick.
                        Some(frame) => Ok(Some(frame)),
                        None => Err(GestureError::CameraUnavailable(
                            "landmark feed closed".to_string(),
                        )),
                    };
                }
            }
        }
    }
}

/// Parses sidecar records into keypoint vectors. A malformed line or an
/// explicit `null` is "no hand this frame"; a wrong-length vector is left
/// for the classifier to reject so the shape contract lives in one place.
#[derive(Debug)]
pub struct FeedExtractor;

impl LandmarkExtractor for FeedExtractor {
    fn extract(&mut self, frame: &Frame) -> Option<KeypointVector> {
        match serde_json::from_slice::<FeedRecord>(&frame.data) {
            Ok(record) => record.landmarks.map(KeypointVector::new),
            Err(e) => {
                debug!(error = %e, "unparseable feed record");
                None
            }
        }
    }
}

/// Opens the feed and spawns the reader thread. The thread ends when the
/// writer closes the FIFO, which the pipeline then observes as
/// `CameraUnavailable`.
pub fn open(path: &Path) -> Result<(ChannelSource, FeedExtractor), GestureError> {
    let file = File::open(path).map_err(|e| {
        GestureError::CameraUnavailable(format!("{}: {e}", path.display()))
    })?;
    let (tx, rx) = mpsc::channel();
    spawn_reader(file, path.to_path_buf(), tx);
    info!(path = %path.display(), "landmark feed open");
    Ok((ChannelSource { rx }, FeedExtractor))
}

fn spawn_reader(file: File, path: PathBuf, tx: mpsc::Sender<Frame>) {
    thread::Builder::new()
        .name("landmark-feed".to_string())
        .spawn(move || {
            let reader = BufReader::new(file);
            for line in reader.lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "feed read error");
                        break;
                    }
                };
                if line.is_empty() {
                    continue;
                }
                if tx.send(Frame { data: line.into_bytes() }).is_err() {
                    // Pipeline is gone; nothing left to feed.
                    break;
                }
            }
            info!(path = %path.display(), "landmark feed ended");
        })
        .expect("spawning the feed reader thread");
}

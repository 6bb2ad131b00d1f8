//! Error taxonomy for the gesture-switch core.
//!
//! Only `ModelLoad` is fatal, and only at startup. Everything raised on the
//! frame path or the message path is recovered: the offending frame or
//! report is dropped and the loops keep running.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GestureError {
    /// The frozen classifier artifact could not be loaded or is internally
    /// inconsistent. Startup-only; the process does not come up without it.
    #[error("model load failed: {0}")]
    ModelLoad(String),

    /// A keypoint vector with the wrong number of features reached the
    /// classifier. The frame is skipped, the model is never invoked.
    #[error("feature vector has {got} values, model expects {expected}")]
    InvalidFeatureShape { expected: usize, got: usize },

    /// Classifier output outside the closed `<on|off>_device_<1..5>`
    /// vocabulary.
    #[error("unrecognized gesture label: {0:?}")]
    UnrecognizedLabel(String),

    /// Outbound publish could not be handed to the bus. The pending intent
    /// is kept so a later device report can still reconcile.
    #[error("bus publish failed: {0}")]
    BusPublish(String),

    /// The frame source is gone. The capture loop goes idle until the
    /// operator brings it back; the state-sync half keeps running.
    #[error("camera unavailable: {0}")]
    CameraUnavailable(String),

    /// Config file present but unreadable. Startup-only, like `ModelLoad`.
    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

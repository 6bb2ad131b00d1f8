//! Gesture classification against a frozen, versioned model artifact.
//!
//! The artifact is a JSON file holding a linear one-vs-rest scorer: one
//! weight vector and bias per gesture label. It is trained and frozen
//! offline; this module only loads and evaluates it. Loading happens once
//! at startup and failure there is fatal — a daemon without a model has
//! nothing to do.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use gesture_common::GestureError;

/// Feature count the pipeline produces: 21 hand landmarks, x/y/z each.
pub const FEATURE_LEN: usize = 63;

/// Ordered landmark coordinates for one detected hand in one frame.
/// Produced once per frame, discarded after classification.
#[derive(Debug, Clone, PartialEq)]
pub struct KeypointVector(Vec<f32>);

impl KeypointVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

impl From<Vec<f32>> for KeypointVector {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

/// A gesture label from the model's closed vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GestureLabel(String);

impl GestureLabel {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for GestureLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One scored class in the artifact.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelClass {
    pub label: String,
    pub weights: Vec<f32>,
    pub bias: f32,
}

/// The frozen classifier artifact.
#[derive(Debug, Clone, Deserialize)]
pub struct GestureModel {
    /// Artifact version tag, logged at startup so the operator can tell
    /// which frozen model a running daemon carries.
    pub version: String,
    pub feature_len: usize,
    /// Scores below this are "no confident match".
    pub threshold: f32,
    pub classes: Vec<ModelClass>,
}

impl GestureModel {
    /// Loads and validates the artifact. Any inconsistency is `ModelLoad`.
    pub fn load(path: &Path) -> Result<Self, GestureError> {
        let raw = fs::read_to_string(path)
            .map_err(|e| GestureError::ModelLoad(format!("{}: {e}", path.display())))?;
        let model: Self = serde_json::from_str(&raw)
            .map_err(|e| GestureError::ModelLoad(format!("{}: {e}", path.display())))?;
        model.validate()?;
        info!(
            version = %model.version,
            classes = model.classes.len(),
            "gesture model loaded"
        );
        Ok(model)
    }

    fn validate(&self) -> Result<(), GestureError> {
        if self.classes.is_empty() {
            return Err(GestureError::ModelLoad(
                "artifact declares no classes".to_string(),
            ));
        }
        for class in &self.classes {
            if class.weights.len() != self.feature_len {
                return Err(GestureError::ModelLoad(format!(
                    "class {:?} has {} weights, artifact declares {}",
                    class.label,
                    class.weights.len(),
                    self.feature_len
                )));
            }
        }
        Ok(())
    }
}

/// Wraps the frozen model behind the `classify` contract.
#[derive(Debug)]
pub struct GestureClassifier {
    model: GestureModel,
}

impl GestureClassifier {
    pub fn new(model: GestureModel) -> Self {
        Self { model }
    }

    pub fn model_version(&self) -> &str {
        &self.model.version
    }

    /// Classifies one keypoint vector. A wrong-length vector fails with
    /// `InvalidFeatureShape` before any class is scored; a best score below
    /// the threshold is `Ok(None)`.
    pub fn classify(
        &self,
        vector: &KeypointVector,
    ) -> Result<Option<GestureLabel>, GestureError> {
        if vector.len() != self.model.feature_len {
            return Err(GestureError::InvalidFeatureShape {
                expected: self.model.feature_len,
                got: vector.len(),
            });
        }

        let features = vector.as_slice();
        let mut best: Option<(&ModelClass, f32)> = None;
        for class in &self.model.classes {
            let score = class
                .weights
                .iter()
                .zip(features)
                .map(|(w, x)| w * x)
                .sum::<f32>()
                + class.bias;
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((class, score));
            }
        }

        match best {
            Some((class, score)) if score >= self.model.threshold => {
                Ok(Some(GestureLabel(class.label.clone())))
            }
            _ => Ok(None),
        }
    }
}

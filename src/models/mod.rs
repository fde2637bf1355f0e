//! Trained artifacts and the inference pipeline built on them

pub mod artifacts;
pub mod classifier;
pub mod inference;
pub mod loader;
pub mod scaler;

#[cfg(test)]
pub(crate) mod testing;

pub use artifacts::Artifacts;
pub use classifier::{Classifier, OnnxClassifier};
pub use inference::{InferenceEngine, Predictor};
pub use loader::ModelLoader;
pub use scaler::{FeatureScaler, ScalerArtifact};

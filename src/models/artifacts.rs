//! Startup loading of the classifier and scaler

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::ArtifactsConfig;
use crate::error::ArtifactError;
use crate::feature_extractor::{FEATURE_COUNT, NUMERIC_COUNT};
use crate::models::classifier::{Classifier, OnnxClassifier};
use crate::models::loader::ModelLoader;
use crate::models::scaler::{FeatureScaler, ScalerArtifact};

/// The two trained artifacts, frozen after load and shared read-only.
#[derive(Clone)]
pub struct Artifacts {
    pub classifier: Arc<dyn Classifier>,
    pub scaler: Arc<dyn FeatureScaler>,
}

impl Artifacts {
    /// Load both artifacts. Any failure here must abort startup.
    pub fn load(config: &ArtifactsConfig) -> Result<Self, ArtifactError> {
        let scaler = ScalerArtifact::load(&config.scaler_path)?;

        let loader = ModelLoader::with_threads(config.onnx_threads).map_err(|source| {
            ArtifactError::Onnx {
                path: config.model_path.clone(),
                source,
            }
        })?;
        let model = loader.load_model(&config.model_path)?;

        if model.label_output.is_none() && config.classes.is_empty() {
            return Err(ArtifactError::Capability {
                path: config.model_path.clone(),
                reason: "model has no label output and no classes are configured".to_string(),
            });
        }
        if model.label_output.is_some() && config.classes.is_empty() {
            warn!("No classes configured; labels are taken from the model's label output");
        }

        let artifacts = Self {
            classifier: Arc::new(OnnxClassifier::new(model, config.classes.clone())),
            scaler: Arc::new(scaler),
        };
        artifacts.check_schema()?;

        info!(
            model = %config.model_path.display(),
            scaler = %config.scaler_path.display(),
            "Artifacts loaded"
        );

        Ok(artifacts)
    }

    /// Reject artifacts whose column counts disagree with the feature schema.
    pub fn check_schema(&self) -> Result<(), ArtifactError> {
        if self.scaler.n_features() != NUMERIC_COUNT {
            return Err(ArtifactError::SchemaDrift {
                artifact: "scaler",
                expected: NUMERIC_COUNT,
                actual: self.scaler.n_features(),
            });
        }

        match self.classifier.n_features() {
            Some(width) if width != FEATURE_COUNT => Err(ArtifactError::SchemaDrift {
                artifact: "model",
                expected: FEATURE_COUNT,
                actual: width,
            }),
            Some(_) => Ok(()),
            None => {
                warn!("Model does not declare its input width; column count is unchecked");
                Ok(())
            }
        }
    }
}

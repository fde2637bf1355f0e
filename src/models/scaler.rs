//! Pre-fit numeric scaler persisted as JSON

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::{ArtifactError, PredictError};
use crate::feature_extractor::numeric_feature_names;

/// Column-wise numeric transform fit at training time.
pub trait FeatureScaler: Send + Sync {
    /// Number of columns the scaler was fit on.
    fn n_features(&self) -> usize;

    /// Transform one row, column for column.
    fn transform(&self, row: &[f64]) -> Result<Vec<f64>, PredictError>;
}

/// Scaler parameters exported from the training pipeline.
///
/// ```json
/// { "type": "standard", "mean": [...], "scale": [...] }
/// { "type": "min_max", "min": [...], "scale": [...] }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScalerArtifact {
    /// `(x - mean) / scale`
    Standard {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        feature_names: Option<Vec<String>>,
        mean: Vec<f64>,
        scale: Vec<f64>,
    },
    /// `x * scale + min`
    MinMax {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        feature_names: Option<Vec<String>>,
        min: Vec<f64>,
        scale: Vec<f64>,
    },
}

impl ScalerArtifact {
    /// Load and validate a scaler from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ArtifactError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ArtifactError::NotFound(path.to_path_buf()));
        }

        info!(path = %path.display(), "Loading scaler");

        let bytes = std::fs::read(path).map_err(|source| ArtifactError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let scaler: ScalerArtifact =
            serde_json::from_slice(&bytes).map_err(|source| ArtifactError::Decode {
                path: path.to_path_buf(),
                source,
            })?;

        scaler
            .validate()
            .map_err(|reason| ArtifactError::Capability {
                path: path.to_path_buf(),
                reason,
            })?;

        info!(
            path = %path.display(),
            kind = scaler.kind(),
            columns = scaler.n_features(),
            "Scaler loaded successfully"
        );

        Ok(scaler)
    }

    /// Scaler variant name.
    pub fn kind(&self) -> &'static str {
        match self {
            ScalerArtifact::Standard { .. } => "standard",
            ScalerArtifact::MinMax { .. } => "min_max",
        }
    }

    fn params(&self) -> (&[f64], &[f64], Option<&[String]>) {
        match self {
            ScalerArtifact::Standard {
                feature_names,
                mean,
                scale,
            } => (mean.as_slice(), scale.as_slice(), feature_names.as_deref()),
            ScalerArtifact::MinMax {
                feature_names,
                min,
                scale,
            } => (min.as_slice(), scale.as_slice(), feature_names.as_deref()),
        }
    }

    fn validate(&self) -> Result<(), String> {
        let (offset, scale, names) = self.params();

        if offset.len() != scale.len() {
            return Err(format!(
                "parameter lengths differ ({} vs {})",
                offset.len(),
                scale.len()
            ));
        }
        if offset.iter().chain(scale).any(|v| !v.is_finite()) {
            return Err("parameters must be finite".to_string());
        }
        if let Some(names) = names {
            if names.iter().map(String::as_str).ne(numeric_feature_names().iter().copied()) {
                return Err(format!(
                    "fit on columns {:?}, expected {:?}",
                    names,
                    numeric_feature_names()
                ));
            }
        }
        Ok(())
    }
}

impl FeatureScaler for ScalerArtifact {
    fn n_features(&self) -> usize {
        self.params().0.len()
    }

    fn transform(&self, row: &[f64]) -> Result<Vec<f64>, PredictError> {
        if row.len() != self.n_features() {
            return Err(PredictError::SchemaMismatch {
                stage: "scaler",
                expected: self.n_features(),
                actual: row.len(),
            });
        }

        let scaled = match self {
            ScalerArtifact::Standard { mean, scale, .. } => row
                .iter()
                .zip(mean.iter().zip(scale))
                .map(|(x, (m, s))| (x - m) / non_zero(*s))
                .collect(),
            ScalerArtifact::MinMax { min, scale, .. } => row
                .iter()
                .zip(min.iter().zip(scale))
                .map(|(x, (m, s))| x * s + m)
                .collect(),
        };
        Ok(scaled)
    }
}

/// Constant columns were fit with a zero scale; they pass through unscaled.
fn non_zero(scale: f64) -> f64 {
    if scale == 0.0 {
        1.0
    } else {
        scale
    }
}

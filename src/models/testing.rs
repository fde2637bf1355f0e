//! In-process artifacts for exercising the pipeline without model files

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::PredictError;
use crate::feature_extractor::FEATURE_COUNT;
use crate::models::classifier::Classifier;
use crate::models::scaler::ScalerArtifact;

/// Logistic model over the scaled amount: the larger the amount, the more
/// likely fraud. Records every row it is asked to score.
pub struct MockClassifier {
    pub width: Option<usize>,
    pub calls: AtomicUsize,
    pub last_row: std::sync::Mutex<Vec<f32>>,
}

impl MockClassifier {
    pub fn new() -> Self {
        Self {
            width: Some(FEATURE_COUNT),
            calls: AtomicUsize::new(0),
            last_row: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn with_width(width: Option<usize>) -> Self {
        Self {
            width,
            ..Self::new()
        }
    }
}

impl Classifier for MockClassifier {
    fn n_features(&self) -> Option<usize> {
        self.width
    }

    fn classes(&self) -> &[i64] {
        &[0, 1]
    }

    fn predict_proba(&self, row: &[f32]) -> Result<Vec<f64>, PredictError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_row.lock().unwrap() = row.to_vec();

        let amt = row[0] as f64;
        let fraud = 1.0 / (1.0 + (-amt).exp());
        Ok(vec![1.0 - fraud, fraud])
    }
}

/// Standard scaler over the nine numeric columns.
pub fn standard_scaler() -> ScalerArtifact {
    ScalerArtifact::Standard {
        feature_names: None,
        mean: vec![70.0, 50000.0, 38.0, -90.0, 90000.0, 38.0, -90.0, 45.0, 12.0],
        scale: vec![150.0, 27000.0, 5.0, 14.0, 300000.0, 5.0, 14.0, 17.0, 7.0],
    }
}

/// Scaler that leaves every numeric column unchanged.
pub fn identity_scaler(columns: usize) -> ScalerArtifact {
    ScalerArtifact::Standard {
        feature_names: None,
        mean: vec![0.0; columns],
        scale: vec![1.0; columns],
    }
}

//! Prediction results and their wire representation

use serde::{Deserialize, Serialize};

use crate::types::transaction::TransactionRecord;

/// Class label and per-class probabilities for a single row.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassPrediction {
    /// Predicted class label
    pub label: i64,
    /// Probabilities in the classifier's class order
    pub probabilities: Vec<f64>,
}

impl ClassPrediction {
    /// Probability of the last class, the fraud class for a binary model.
    pub fn positive_probability(&self) -> f64 {
        self.probabilities.last().copied().unwrap_or(0.0)
    }
}

/// Output of the scoring pipeline, with the scored input echoed back.
#[derive(Debug, Clone)]
pub struct PredictionResult {
    pub prediction: ClassPrediction,
    pub record: TransactionRecord,
}

/// Success body of `POST /predict`.
///
/// The outer arrays hold one entry per scored row; the endpoint always
/// scores exactly one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    #[serde(rename = "Prediction")]
    pub prediction: Vec<i64>,
    #[serde(rename = "Probability")]
    pub probability: Vec<Vec<f64>>,
}

impl From<&PredictionResult> for PredictionResponse {
    fn from(result: &PredictionResult) -> Self {
        Self {
            prediction: vec![result.prediction.label],
            probability: vec![result.prediction.probabilities.clone()],
        }
    }
}

/// Error body returned for any failed request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

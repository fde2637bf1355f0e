//! Scoring pipeline: features, scaling, classification

use std::sync::Arc;
use tracing::debug;

use crate::error::PredictError;
use crate::feature_extractor::FeatureExtractor;
use crate::models::artifacts::Artifacts;
use crate::models::classifier::Classifier;
use crate::normalizer::{Normalizer, ScaledFeatures};
use crate::types::prediction::{ClassPrediction, PredictionResult};
use crate::types::transaction::TransactionRecord;

/// Runs the classifier on a scaled feature row.
#[derive(Clone)]
pub struct Predictor {
    classifier: Arc<dyn Classifier>,
}

impl Predictor {
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self { classifier }
    }

    /// Predict one label and its class probabilities.
    pub fn predict(&self, features: &ScaledFeatures) -> Result<ClassPrediction, PredictError> {
        let row = features.to_row();

        if let Some(expected) = self.classifier.n_features() {
            if expected != row.len() {
                return Err(PredictError::SchemaMismatch {
                    stage: "classifier",
                    expected,
                    actual: row.len(),
                });
            }
        }

        let prediction = self.classifier.classify(&row)?;
        if prediction.probabilities.is_empty() {
            return Err(PredictError::Inference(
                "classifier returned no probabilities".to_string(),
            ));
        }
        Ok(prediction)
    }

    pub fn classes(&self) -> &[i64] {
        self.classifier.classes()
    }
}

/// Transaction scoring pipeline.
///
/// Holds only read-only artifacts, so one instance is shared by every
/// request.
pub struct InferenceEngine {
    extractor: FeatureExtractor,
    normalizer: Normalizer,
    predictor: Predictor,
}

impl InferenceEngine {
    /// Create an inference engine from loaded artifacts
    pub fn new(artifacts: &Artifacts) -> Self {
        Self::from_parts(
            Normalizer::new(artifacts.scaler.clone()),
            Predictor::new(artifacts.classifier.clone()),
        )
    }

    pub fn from_parts(normalizer: Normalizer, predictor: Predictor) -> Self {
        Self {
            extractor: FeatureExtractor::new(),
            normalizer,
            predictor,
        }
    }

    /// Score one transaction.
    pub fn predict(&self, record: TransactionRecord) -> Result<PredictionResult, PredictError> {
        let features = self.extractor.extract(&record)?;
        let scaled = self.normalizer.normalize(&features)?;
        let prediction = self.predictor.predict(&scaled)?;

        debug!(
            age = features.age,
            hour = features.hour,
            category = ?features.category,
            label = prediction.label,
            fraud_probability = prediction.positive_probability(),
            "Transaction scored"
        );

        Ok(PredictionResult { prediction, record })
    }

    /// Number of model input columns.
    pub fn feature_count(&self) -> usize {
        self.extractor.feature_count()
    }

    /// Class labels in probability order.
    pub fn classes(&self) -> &[i64] {
        self.predictor.classes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature_extractor::NUMERIC_COUNT;
    use crate::models::scaler::FeatureScaler;
    use crate::models::testing::{identity_scaler, standard_scaler, MockClassifier};
    use serde_json::json;
    use std::sync::atomic::Ordering;

    fn engine_with(classifier: Arc<MockClassifier>) -> InferenceEngine {
        let artifacts = Artifacts {
            classifier,
            scaler: Arc::new(standard_scaler()),
        };
        InferenceEngine::new(&artifacts)
    }

    fn sample_record() -> TransactionRecord {
        serde_json::from_value(json!({
            "amt": 100.0,
            "zip": 10001,
            "lat": 40.7,
            "long": -74.0,
            "city_pop": 5000,
            "merch_lat": 40.71,
            "merch_long": -74.01,
            "trans_date_trans_time": "2023-01-01 08:00:00",
            "dob": "1985-01-01",
            "category": "grocery_pos",
            "gender": "M"
        }))
        .unwrap()
    }

    #[test]
    fn test_end_to_end_prediction() {
        let classifier = Arc::new(MockClassifier::new());
        let engine = engine_with(classifier.clone());

        let result = engine.predict(sample_record()).unwrap();

        let probabilities = &result.prediction.probabilities;
        assert_eq!(probabilities.len(), 2);
        assert!((probabilities.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(engine.classes().contains(&result.prediction.label));
        assert_eq!(result.record, sample_record());

        // The classifier saw the scaled numerics and the raw indicators
        let row = classifier.last_row.lock().unwrap().clone();
        let expected = standard_scaler()
            .transform(&[100.0, 10001.0, 40.7, -74.0, 5000.0, 40.71, -74.01, 38.0, 8.0])
            .unwrap();
        for i in 0..NUMERIC_COUNT {
            assert!((row[i] as f64 - expected[i]).abs() < 1e-5, "column {i}");
        }
        assert_eq!(row[NUMERIC_COUNT + 3], 1.0); // category_grocery_pos
        assert_eq!(row[NUMERIC_COUNT..].iter().sum::<f32>(), 2.0);
    }

    #[test]
    fn test_label_follows_probabilities() {
        let engine = InferenceEngine::from_parts(
            Normalizer::new(Arc::new(identity_scaler(NUMERIC_COUNT))),
            Predictor::new(Arc::new(MockClassifier::new())),
        );

        let mut small = sample_record();
        small.amt = Some(-5.0);
        assert_eq!(engine.predict(small).unwrap().prediction.label, 0);

        let mut large = sample_record();
        large.amt = Some(5.0);
        assert_eq!(engine.predict(large).unwrap().prediction.label, 1);
    }

    #[test]
    fn test_malformed_date_never_reaches_model() {
        let classifier = Arc::new(MockClassifier::new());
        let engine = engine_with(classifier.clone());

        let mut record = sample_record();
        record.trans_date_trans_time = Some("not-a-date".to_string());

        let err = engine.predict(record).unwrap_err();
        assert!(matches!(err, PredictError::InvalidDate { .. }));
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_classifier_width_mismatch() {
        let engine = engine_with(Arc::new(MockClassifier::with_width(Some(22))));

        let err = engine.predict(sample_record()).unwrap_err();
        assert!(matches!(
            err,
            PredictError::SchemaMismatch {
                stage: "classifier",
                expected: 22,
                actual: 23
            }
        ));
    }

    #[test]
    fn test_unknown_width_is_not_checked() {
        let engine = engine_with(Arc::new(MockClassifier::with_width(None)));
        assert!(engine.predict(sample_record()).is_ok());
    }
}

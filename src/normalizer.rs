//! Scaling of the numeric feature columns

use std::sync::Arc;

use crate::error::PredictError;
use crate::feature_extractor::{
    numeric_feature_names, FeatureVector, FEATURE_COUNT, INDICATOR_COUNT, NUMERIC_COUNT,
};
use crate::models::scaler::FeatureScaler;

/// Feature row after scaling, ready for the classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaledFeatures {
    /// Scaled numeric columns, in scaler order
    pub numeric: [f64; NUMERIC_COUNT],
    /// Category and gender indicators, untouched
    pub indicators: [bool; INDICATOR_COUNT],
}

impl ScaledFeatures {
    /// Model input row: scaled numerics followed by indicators as 0.0 / 1.0.
    pub fn to_row(&self) -> Vec<f32> {
        let mut row = Vec::with_capacity(FEATURE_COUNT);
        row.extend(self.numeric.iter().map(|&v| v as f32));
        row.extend(self.indicators.iter().map(|&b| if b { 1.0 } else { 0.0 }));
        row
    }
}

/// Applies the pre-fit scaler to the numeric columns only.
///
/// The numeric / indicator split must be the one the scaler was fit with;
/// nothing here can check that beyond the column count.
#[derive(Clone)]
pub struct Normalizer {
    scaler: Arc<dyn FeatureScaler>,
}

impl Normalizer {
    pub fn new(scaler: Arc<dyn FeatureScaler>) -> Self {
        Self { scaler }
    }

    pub fn normalize(&self, features: &FeatureVector) -> Result<ScaledFeatures, PredictError> {
        let mut numeric = [0.0; NUMERIC_COUNT];
        for ((slot, value), name) in numeric
            .iter_mut()
            .zip(features.numeric())
            .zip(numeric_feature_names().iter().copied())
        {
            *slot = value.ok_or(PredictError::MissingValue(name))?;
        }

        let scaled = self.scaler.transform(&numeric)?;
        let numeric: [f64; NUMERIC_COUNT] =
            scaled
                .try_into()
                .map_err(|scaled: Vec<f64>| PredictError::SchemaMismatch {
                    stage: "scaler output",
                    expected: NUMERIC_COUNT,
                    actual: scaled.len(),
                })?;

        Ok(ScaledFeatures {
            numeric,
            indicators: features.indicators(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature_extractor::{Category, FeatureExtractor};
    use crate::models::scaler::ScalerArtifact;
    use crate::models::testing::{identity_scaler, standard_scaler};
    use crate::types::transaction::TransactionRecord;
    use serde_json::json;

    fn features() -> FeatureVector {
        let record: TransactionRecord = serde_json::from_value(json!({
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
        .unwrap();
        FeatureExtractor::new().extract(&record).unwrap()
    }

    #[test]
    fn test_scales_numeric_columns_only() {
        let scaler = standard_scaler();
        let normalizer = Normalizer::new(Arc::new(scaler.clone()));
        let features = features();

        let scaled = normalizer.normalize(&features).unwrap();

        let raw: Vec<f64> = features.numeric().iter().map(|v| v.unwrap()).collect();
        let expected = scaler.transform(&raw).unwrap();
        assert_eq!(scaled.numeric.to_vec(), expected);
        assert_eq!(scaled.indicators, features.indicators());

        let ScalerArtifact::Standard { mean, scale, .. } = &scaler else {
            unreachable!()
        };
        for i in 0..NUMERIC_COUNT {
            assert!((scaled.numeric[i] - (raw[i] - mean[i]) / scale[i]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_row_layout() {
        let normalizer = Normalizer::new(Arc::new(identity_scaler(NUMERIC_COUNT)));
        let features = features();

        let row = normalizer.normalize(&features).unwrap().to_row();

        assert_eq!(row.len(), FEATURE_COUNT);
        assert_eq!(row[0], 100.0);
        assert_eq!(row[7], 38.0); // Age
        assert_eq!(row[8], 8.0); // hour
        let grocery_pos = Category::ENCODED
            .iter()
            .position(|&c| c == Category::GroceryPos)
            .unwrap();
        for (i, &v) in row[NUMERIC_COUNT..NUMERIC_COUNT + 13].iter().enumerate() {
            assert_eq!(v, if i == grocery_pos { 1.0 } else { 0.0 });
        }
        assert_eq!(row[22], 1.0); // gender_M
    }

    #[test]
    fn test_missing_numeric_value() {
        let normalizer = Normalizer::new(Arc::new(identity_scaler(NUMERIC_COUNT)));
        let mut features = features();
        features.city_pop = None;

        let err = normalizer.normalize(&features).unwrap_err();
        assert!(matches!(err, PredictError::MissingValue("city_pop")));
    }

    #[test]
    fn test_scaler_width_mismatch() {
        let normalizer = Normalizer::new(Arc::new(identity_scaler(8)));

        let err = normalizer.normalize(&features()).unwrap_err();
        assert!(matches!(
            err,
            PredictError::SchemaMismatch {
                stage: "scaler",
                expected: 8,
                actual: 9
            }
        ));
    }
}

//! Fraud Scoring Service Library
//!
//! Scores a single credit card transaction for fraud with a pre-trained
//! classifier: raw record, engineered features, scaled features, prediction.

pub mod config;
pub mod error;
pub mod feature_extractor;
pub mod metrics;
pub mod models;
pub mod normalizer;
pub mod server;
pub mod types;

pub use config::AppConfig;
pub use error::{ArtifactError, PredictError};
pub use feature_extractor::{Category, FeatureExtractor, FeatureVector};
pub use models::{Artifacts, InferenceEngine};
pub use normalizer::Normalizer;
pub use types::{PredictionResponse, PredictionResult, TransactionRecord};

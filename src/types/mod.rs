//! Type definitions for the scoring service

pub mod prediction;
pub mod transaction;

pub use prediction::{ClassPrediction, ErrorResponse, PredictionResponse, PredictionResult};
pub use transaction::TransactionRecord;

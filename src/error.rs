//! Error types for artifact loading and request scoring

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::path::PathBuf;
use thiserror::Error;

use crate::types::prediction::ErrorResponse;

/// Failure to bring the model or scaler into memory at startup.
///
/// Every variant is fatal: the service must not start serving.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read artifact {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode artifact {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("onnx runtime rejected {}: {source}", .path.display())]
    Onnx {
        path: PathBuf,
        #[source]
        source: ort::Error,
    },

    #[error("artifact {} is unusable: {reason}", .path.display())]
    Capability { path: PathBuf, reason: String },

    #[error("{artifact} expects {actual} columns, feature schema has {expected}")]
    SchemaDrift {
        artifact: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Failure while scoring a single transaction.
#[derive(Debug, Error)]
pub enum PredictError {
    #[error("invalid request body: {0}")]
    InvalidBody(String),

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("field `{field}` has value {value:?} which does not match the expected format")]
    InvalidDate {
        field: &'static str,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("numeric feature `{0}` is missing and cannot be scaled")]
    MissingValue(&'static str),

    #[error("{stage} expected {expected} columns but received {actual}")]
    SchemaMismatch {
        stage: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("inference failed: {0}")]
    Inference(String),
}

impl PredictError {
    /// Stable machine-readable name used in responses and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            PredictError::InvalidBody(_) => "invalid_body",
            PredictError::MissingField(_) => "missing_field",
            PredictError::InvalidDate { .. } => "invalid_date",
            PredictError::MissingValue(_) => "missing_value",
            PredictError::SchemaMismatch { .. } => "schema_mismatch",
            PredictError::Inference(_) => "inference",
        }
    }

    /// Client errors are caused by the request, everything else is ours.
    pub fn status(&self) -> StatusCode {
        match self {
            PredictError::InvalidBody(_)
            | PredictError::MissingField(_)
            | PredictError::InvalidDate { .. }
            | PredictError::MissingValue(_) => StatusCode::BAD_REQUEST,
            PredictError::SchemaMismatch { .. } | PredictError::Inference(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }
}

impl IntoResponse for PredictError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.kind().to_string(),
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

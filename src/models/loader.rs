//! ONNX classifier loader

use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::ValueType;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::ArtifactError;

/// Loaded ONNX classifier with the names of its inputs and outputs
pub struct LoadedModel {
    /// File the model was loaded from
    pub path: PathBuf,
    /// ONNX Runtime session
    pub session: Session,
    /// Input name for the feature row
    pub input_name: String,
    /// Output carrying class probabilities
    pub probability_output: String,
    /// Output carrying the predicted label, if the export kept one
    pub label_output: Option<String>,
    /// Static row width declared by the model, if any
    pub n_features: Option<usize>,
}

/// Loader for ONNX classifiers
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    /// Create a new model loader with specified number of threads
    pub fn with_threads(onnx_threads: usize) -> Result<Self, ort::Error> {
        // Initialize ONNX Runtime
        ort::init().commit()?;
        info!(onnx_threads = onnx_threads, "ONNX Runtime initialized");
        Ok(Self { onnx_threads })
    }

    /// Load a classifier from file.
    ///
    /// Fails when the file is missing, is not a valid ONNX graph, or the graph
    /// has no probability output to answer `predict_proba` with.
    pub fn load_model<P: AsRef<Path>>(&self, path: P) -> Result<LoadedModel, ArtifactError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ArtifactError::NotFound(path.to_path_buf()));
        }

        info!(path = %path.display(), threads = self.onnx_threads, "Loading ONNX model");

        let session =
            build_session(path, self.onnx_threads).map_err(|source| ArtifactError::Onnx {
                path: path.to_path_buf(),
                source,
            })?;

        let input = session
            .inputs
            .first()
            .ok_or_else(|| ArtifactError::Capability {
                path: path.to_path_buf(),
                reason: "model declares no inputs".to_string(),
            })?;
        let input_name = input.name.clone();
        let n_features = row_width(&input.input_type);

        let output_names: Vec<&str> = session.outputs.iter().map(|o| o.name.as_str()).collect();
        let probability_output =
            select_probability_output(&output_names).ok_or_else(|| ArtifactError::Capability {
                path: path.to_path_buf(),
                reason: format!("no probability output among {:?}", output_names),
            })?;
        let label_output = select_label_output(&output_names);

        info!(
            path = %path.display(),
            input = %input_name,
            probabilities = %probability_output,
            label = ?label_output,
            n_features = ?n_features,
            "Model loaded successfully"
        );

        Ok(LoadedModel {
            path: path.to_path_buf(),
            session,
            input_name,
            probability_output,
            label_output,
            n_features,
        })
    }
}

fn build_session(path: &Path, onnx_threads: usize) -> ort::Result<Session> {
    let session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(onnx_threads)?
        .commit_from_file(path)?;
    Ok(session)
}

/// Pick the probability output: one named like it, or the last non-label output.
fn select_probability_output(names: &[&str]) -> Option<String> {
    names
        .iter()
        .find(|n| n.contains("prob"))
        .or_else(|| names.iter().rev().find(|n| !n.contains("label")))
        .map(|n| n.to_string())
}

fn select_label_output(names: &[&str]) -> Option<String> {
    names
        .iter()
        .find(|n| n.contains("label"))
        .map(|n| n.to_string())
}

/// Last dimension of a 2-D float input, when it is static.
fn row_width(input_type: &ValueType) -> Option<usize> {
    match input_type {
        ValueType::Tensor { shape, .. } => shape
            .last()
            .and_then(|&d| if d > 0 { Some(d as usize) } else { None }),
        _ => None,
    }
}

//! Classifier abstraction and its ONNX Runtime implementation

use ort::memory::Allocator;
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, DynValue, Tensor};
use std::sync::Mutex;
use tracing::debug;

use crate::error::PredictError;
use crate::models::loader::LoadedModel;
use crate::types::prediction::ClassPrediction;

/// A pre-fit classifier scoring one feature row at a time.
pub trait Classifier: Send + Sync {
    /// Row width the classifier was trained on, when known.
    fn n_features(&self) -> Option<usize>;

    /// Class labels in probability order.
    fn classes(&self) -> &[i64];

    /// Per-class probabilities for one row.
    fn predict_proba(&self, row: &[f32]) -> Result<Vec<f64>, PredictError>;

    /// Predicted class label for one row.
    fn predict(&self, row: &[f32]) -> Result<i64, PredictError> {
        let probabilities = self.predict_proba(row)?;
        argmax_label(&probabilities, self.classes())
    }

    /// Label and probabilities together.
    ///
    /// Implementations that get both from one pass should override this.
    fn classify(&self, row: &[f32]) -> Result<ClassPrediction, PredictError> {
        Ok(ClassPrediction {
            label: self.predict(row)?,
            probabilities: self.predict_proba(row)?,
        })
    }
}

/// Label of the most probable class. Ties go to the first class.
pub fn argmax_label(probabilities: &[f64], classes: &[i64]) -> Result<i64, PredictError> {
    if probabilities.len() != classes.len() {
        return Err(PredictError::Inference(format!(
            "model returned {} probabilities for {} classes",
            probabilities.len(),
            classes.len()
        )));
    }

    probabilities
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (idx, &p)| match best {
            Some((_, best_p)) if best_p >= p => best,
            _ => Some((idx, p)),
        })
        .map(|(idx, _)| classes[idx])
        .ok_or_else(|| PredictError::Inference("model returned no probabilities".to_string()))
}

/// Classifier backed by an ONNX Runtime session.
///
/// Sessions need exclusive access to run, so concurrent requests take turns.
pub struct OnnxClassifier {
    model: Mutex<LoadedModel>,
    classes: Vec<i64>,
    n_features: Option<usize>,
}

impl OnnxClassifier {
    /// Wrap a loaded model. `classes` names the probability columns.
    pub fn new(model: LoadedModel, classes: Vec<i64>) -> Self {
        let n_features = model.n_features;
        Self {
            model: Mutex::new(model),
            classes,
            n_features,
        }
    }

    fn run(&self, row: &[f32]) -> Result<ClassPrediction, PredictError> {
        let mut guard = self
            .model
            .lock()
            .map_err(|e| PredictError::Inference(format!("model lock poisoned: {e}")))?;
        let model = &mut *guard;

        // Prepare input tensor - shape [1, num_features]
        let shape = vec![1_i64, row.len() as i64];
        let input_tensor = Tensor::from_array((shape, row.to_vec())).map_err(inference_err)?;

        let outputs = model
            .session
            .run(ort::inputs![model.input_name.as_str() => input_tensor])
            .map_err(inference_err)?;

        let probability_output = outputs
            .get(model.probability_output.as_str())
            .ok_or_else(|| {
                PredictError::Inference(format!(
                    "output `{}` missing from model results",
                    model.probability_output
                ))
            })?;
        let probabilities = extract_probabilities(probability_output)?;

        let label = match &model.label_output {
            Some(name) => match outputs.get(name.as_str()) {
                Some(output) => extract_label(output)?,
                None => argmax_label(&probabilities, &self.classes)?,
            },
            None => argmax_label(&probabilities, &self.classes)?,
        };

        debug!(
            model = %model.path.display(),
            label = label,
            probabilities = ?probabilities,
            "Model inference complete"
        );

        Ok(ClassPrediction {
            label,
            probabilities,
        })
    }
}

impl Classifier for OnnxClassifier {
    fn n_features(&self) -> Option<usize> {
        self.n_features
    }

    fn classes(&self) -> &[i64] {
        &self.classes
    }

    fn predict_proba(&self, row: &[f32]) -> Result<Vec<f64>, PredictError> {
        Ok(self.run(row)?.probabilities)
    }

    fn predict(&self, row: &[f32]) -> Result<i64, PredictError> {
        Ok(self.run(row)?.label)
    }

    fn classify(&self, row: &[f32]) -> Result<ClassPrediction, PredictError> {
        self.run(row)
    }
}

fn inference_err(e: ort::Error) -> PredictError {
    PredictError::Inference(e.to_string())
}

/// Read class probabilities for the single scored row.
///
/// Handles plain tensor outputs as well as the seq(map(int64, float))
/// produced by ZipMap-style exports.
fn extract_probabilities(output: &DynValue) -> Result<Vec<f64>, PredictError> {
    if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
        let dims: Vec<i64> = shape.iter().copied().collect();
        return Ok(first_row(&dims, data).iter().map(|&p| p as f64).collect());
    }

    if let Ok((shape, data)) = output.try_extract_tensor::<f64>() {
        let dims: Vec<i64> = shape.iter().copied().collect();
        return Ok(first_row(&dims, data).to_vec());
    }

    let dtype = output.dtype();
    if DynSequenceValueType::can_downcast(&dtype) {
        return extract_from_sequence_map(output);
    }

    Err(PredictError::Inference(format!(
        "unsupported probability output type {dtype:?}"
    )))
}

/// First row of a `[batch, classes]` or `[classes]` tensor.
fn first_row<'a, T>(shape: &[i64], data: &'a [T]) -> &'a [T] {
    let width = match shape {
        [_, classes] if *classes > 0 => *classes as usize,
        _ => data.len(),
    };
    &data[..width.min(data.len())]
}

/// Extract probabilities from seq(map(int64, float)), ordered by class id.
fn extract_from_sequence_map(output: &DynValue) -> Result<Vec<f64>, PredictError> {
    let allocator = Allocator::default();

    let sequence = output
        .downcast_ref::<DynSequenceValueType>()
        .map_err(inference_err)?;

    let maps = sequence
        .try_extract_sequence::<DynMapValueType>(&allocator)
        .map_err(inference_err)?;

    // One map per row; only one row is ever scored
    let map_value = maps
        .first()
        .ok_or_else(|| PredictError::Inference("empty probability sequence".to_string()))?;

    let mut kv_pairs = map_value
        .try_extract_key_values::<i64, f32>()
        .map_err(inference_err)?;
    kv_pairs.sort_by_key(|(class_id, _)| *class_id);

    Ok(kv_pairs.into_iter().map(|(_, p)| p as f64).collect())
}

fn extract_label(output: &DynValue) -> Result<i64, PredictError> {
    let (_, data) = output.try_extract_tensor::<i64>().map_err(inference_err)?;
    data.first()
        .copied()
        .ok_or_else(|| PredictError::Inference("empty label output".to_string()))
}

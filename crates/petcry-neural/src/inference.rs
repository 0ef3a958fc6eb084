//! Cry classifier backends
//!
//! [`Classifier`] is the seam between the feature pipeline and whatever
//! produces scores. [`OnnxClassifier`] runs the trained network with ORT
//! (ONNX Runtime); tests plug in stubs.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ort::inputs;
use ort::session::{builder::SessionBuilder, Session};
use ort::value::Value;
use thiserror::Error;

use crate::tensor::InputTensor;

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("ORT error: {0}")]
    Ort(#[from] ort::Error),
    #[error("Input shape mismatch: expected {expected:?}, got {actual:?}")]
    Shape {
        expected: [usize; 4],
        actual: [usize; 4],
    },
    #[error("Output size mismatch: expected {expected} scores, got {actual}")]
    OutputSize { expected: usize, actual: usize },
    #[error("Other error: {0}")]
    Other(String),
}

/// Scores one prepared tensor.
///
/// Implementations are loaded once and shared read-only across requests,
/// so they must be `Send + Sync`. The returned vector has exactly
/// [`num_classes`](Classifier::num_classes) entries, positionally aligned
/// with the label set in use.
pub trait Classifier: Send + Sync {
    /// Shape the classifier accepts, `[1, bands, frames, channels]`.
    fn input_shape(&self) -> [usize; 4];

    /// Length of the output score vector.
    fn num_classes(&self) -> usize;

    fn classify(&self, input: &InputTensor) -> Result<Vec<f32>, InferenceError>;
}

/// ONNX classifier
///
/// The session sits behind a mutex: one inference at a time per model,
/// while feature extraction for other requests proceeds in parallel.
#[derive(Clone)]
pub struct OnnxClassifier {
    session: Arc<Mutex<Session>>,
    input_shape: [usize; 4],
    num_classes: usize,
}

impl std::fmt::Debug for OnnxClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxClassifier")
            .field("input_shape", &self.input_shape)
            .field("num_classes", &self.num_classes)
            .finish()
    }
}

impl OnnxClassifier {
    /// Load a model file and check it against its declared contract.
    ///
    /// A zero tensor of `input_shape` is run once; the model must accept it
    /// and return `num_classes` scores, otherwise loading fails.
    pub fn load(
        model_path: &Path,
        input_shape: [usize; 4],
        num_classes: usize,
        intra_threads: usize,
    ) -> Result<Self, InferenceError> {
        let _ = ort::init().with_name("petcry").commit();

        let session = SessionBuilder::new()?
            .with_intra_threads(intra_threads.max(1))?
            .commit_from_file(model_path)?;

        let classifier = Self {
            session: Arc::new(Mutex::new(session)),
            input_shape,
            num_classes,
        };

        let warmup = classifier.classify(&InputTensor::zeros(input_shape))?;
        tracing::info!(
            "Loaded classifier {:?}: input {:?}, {} classes",
            model_path,
            input_shape,
            warmup.len()
        );

        Ok(classifier)
    }

    fn run(&self, input: &InputTensor) -> Result<Vec<f32>, InferenceError> {
        let shape: Vec<usize> = input.shape().to_vec();
        let value = Value::from_array((shape, input.to_vec()))?;

        let mut session = lock_session(&self.session);
        let outputs = session.run(inputs![value])?;
        let scores = outputs[0].try_extract_tensor::<f32>()?;
        Ok(scores.1.to_vec())
    }
}

/// Lock the session, taking it back if an earlier inference panicked.
///
/// A panic inside `run` poisons the mutex but leaves the session usable; each
/// call builds fresh inputs, so no half-written request state survives.
fn lock_session<T>(session: &Mutex<T>) -> MutexGuard<'_, T> {
    session.lock().unwrap_or_else(|poisoned| {
        tracing::warn!("Recovering classifier session after a panicked inference");
        session.clear_poison();
        PoisonError::into_inner(poisoned)
    })
}

impl Classifier for OnnxClassifier {
    fn input_shape(&self) -> [usize; 4] {
        self.input_shape
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn classify(&self, input: &InputTensor) -> Result<Vec<f32>, InferenceError> {
        if input.shape() != self.input_shape {
            return Err(InferenceError::Shape {
                expected: self.input_shape,
                actual: input.shape(),
            });
        }

        // A crashing model must not take the worker thread down with it.
        let scores = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| self.run(input)))
            .map_err(|_| InferenceError::Other("Inference panicked".to_string()))??;

        if scores.len() != self.num_classes {
            return Err(InferenceError::OutputSize {
                expected: self.num_classes,
                actual: scores.len(),
            });
        }
        Ok(scores)
    }
}

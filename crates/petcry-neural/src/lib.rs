//! Petcry Neural – audio ingestion, mel features, and ONNX cry classification
//!
//! # Architecture
//!
//! ```text
//! audio bytes (.wav/.flac/.ogg/.mp3/.m4a)
//!     │
//!     ▼
//! ┌─────────┐   ┌───────────┐   ┌──────────┐   ┌────────────┐   ┌──────────┐   ┌────────────┐
//! │ Decoder │──▶│ Resampler │──▶│  Window  │──▶│  Log-mel   │──▶│  Resize  │──▶│   Tensor   │
//! │Symphonia│   │  Rubato   │   │  2 s     │   │  rustfft   │   │ 862/64 t │   │[1,128,W,3] │
//! └─────────┘   └───────────┘   └──────────┘   └────────────┘   └──────────┘   └─────┬──────┘
//!                                                                                     ▼
//!                              PredictionMap ◀── rank ◀── labels ◀── Classifier (ORT/ONNX)
//! ```
//!
//! Every stage but the classifier is a pure function over request-local data.
//! The classifier is loaded once, validated against [`features::FeatureConfig`]
//! and shared read-only; [`engine::CryEngine`] runs requests on a bounded pool.

pub mod decoder;
pub mod engine;
pub mod features;
pub mod inference;
pub mod models;
pub mod pipeline;
pub mod resampler;
pub mod resize;
pub mod spectrogram;
pub mod tensor;
pub mod windowing;

pub use decoder::{DecodedAudio, Waveform};
pub use engine::{CryEngine, EngineConfig};
pub use features::{FeatureConfig, FeatureExtractor, FeatureMap};
pub use inference::{Classifier, InferenceError, OnnxClassifier};
pub use models::{ModelError, ModelManager, ModelManifest};
pub use pipeline::{CryPipeline, StartupError};
pub use tensor::InputTensor;
pub use windowing::ShortInputPolicy;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NeuralError {
    #[error("Decoder error: {0}")]
    Decoder(String),

    #[error("Resampler error: {0}")]
    Resampler(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<NeuralError> for petcry_core::PipelineError {
    fn from(err: NeuralError) -> Self {
        petcry_core::PipelineError::Decode(err.to_string())
    }
}

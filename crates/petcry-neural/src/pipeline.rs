//! End-to-end cry classification
//!
//! Decode → Extract → Prepare → Classify → Map → Rank. Each stage either
//! hands its output to the next or fails the whole request; the first
//! failure is returned and nothing partial escapes.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use petcry_core::{
    rank, LabelMapper, ModelUnavailable, PipelineError, Prediction, SpeciesPolicy,
};

use crate::decoder::decode_to_rate;
use crate::features::{FeatureConfig, FeatureExtractor};
use crate::inference::{Classifier, InferenceError, OnnxClassifier};
use crate::models::{ModelError, ModelManager};
use crate::tensor::InputTensor;

/// Fatal problems found while assembling the pipeline.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Model error: {0}")]
    Model(#[from] ModelError),
    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),
    #[error("Classifier expects input {declared:?}, features produce {expected:?}")]
    InputShape {
        expected: [usize; 4],
        declared: [usize; 4],
    },
    #[error("Label set for {species} has {labels} labels, classifier outputs {classes} classes")]
    LabelCount {
        species: &'static str,
        labels: usize,
        classes: usize,
    },
    #[error("Label set for {species} is unusable: {reason}")]
    InvalidLabels {
        species: &'static str,
        reason: String,
    },
}

/// Loaded classifier plus the stateless stages around it.
///
/// Shared read-only between requests; `predict` takes `&self`.
pub struct CryPipeline {
    classifier: Arc<dyn Classifier>,
    labels: LabelMapper,
    extractor: FeatureExtractor,
}

impl std::fmt::Debug for CryPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryPipeline")
            .field("input_shape", &self.classifier.input_shape())
            .field("num_classes", &self.classifier.num_classes())
            .field("labels", &self.labels)
            .field("features", self.extractor.config())
            .finish()
    }
}

impl CryPipeline {
    /// Assemble a pipeline after checking the classifier's contract.
    ///
    /// The classifier must accept exactly the tensor the feature config
    /// produces, and every label set must have one distinct, non-blank label
    /// per output class.
    pub fn new(
        classifier: Arc<dyn Classifier>,
        labels: LabelMapper,
        features: FeatureConfig,
    ) -> Result<Self, StartupError> {
        let expected = features.input_shape();
        let declared = classifier.input_shape();
        if expected != declared {
            return Err(StartupError::InputShape { expected, declared });
        }

        let classes = classifier.num_classes();
        for (species, set) in labels.sets() {
            if set.len() != classes {
                return Err(StartupError::LabelCount {
                    species,
                    labels: set.len(),
                    classes,
                });
            }
            set.validate()
                .map_err(|reason| StartupError::InvalidLabels { species, reason })?;
        }

        Ok(Self {
            classifier,
            labels,
            extractor: FeatureExtractor::new(features),
        })
    }

    /// Load the staged ONNX model from `manager` and assemble the pipeline.
    pub fn from_model_dir(
        manager: &ModelManager,
        policy: SpeciesPolicy,
        features: FeatureConfig,
        intra_threads: usize,
    ) -> Result<Self, StartupError> {
        let (path, manifest) = manager.classifier_offline()?;
        let classifier =
            OnnxClassifier::load(&path, manifest.input_shape, manifest.num_classes, intra_threads)?;
        let labels = LabelMapper::with_overrides(&manifest.labels).with_policy(policy);
        Self::new(Arc::new(classifier), labels, features)
    }

    pub fn labels(&self) -> &LabelMapper {
        &self.labels
    }

    pub fn features(&self) -> &FeatureConfig {
        self.extractor.config()
    }

    pub fn classifier(&self) -> &Arc<dyn Classifier> {
        &self.classifier
    }

    /// Classify one recording.
    pub fn predict(&self, audio: &[u8], species: Option<&str>) -> Result<Prediction, PipelineError> {
        let config = self.extractor.config();
        let decoded = decode_to_rate(audio, config.sample_rate, Some(config.window_secs))?;
        let duration_secs = decoded.duration_secs;

        let features = self.extractor.extract(&decoded.waveform)?;
        let tensor = InputTensor::from_feature_map(&features)?;

        let scores = self
            .classifier
            .classify(&tensor)
            .map_err(|e| ModelUnavailable::Backend(e.to_string()))?;
        if let Some(bad) = scores.iter().find(|s| !s.is_finite()) {
            return Err(ModelUnavailable::Backend(format!("classifier returned {}", bad)).into());
        }

        let (species, label_set) = self.labels.resolve(species)?;
        let predictions = rank(&scores, label_set)?;

        tracing::debug!(
            "Classified {:.2}s clip as {:?} (species {:?})",
            duration_secs,
            predictions.top(),
            species
        );
        Ok(Prediction::new(species, duration_secs, predictions))
    }

    /// Classify a file on disk.
    pub fn predict_file(
        &self,
        path: &Path,
        species: Option<&str>,
    ) -> Result<Prediction, PipelineError> {
        let bytes = std::fs::read(path)
            .map_err(|e| PipelineError::Decode(format!("{}: {}", path.display(), e)))?;
        self.predict(&bytes, species)
    }
}

//! Request-level error taxonomy shared by every pipeline stage.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// A single propagated pipeline failure.
///
/// The first failing stage wins; no partial result accompanies an error.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Shape error: {0}")]
    Shape(String),

    #[error("Invalid species: {0}")]
    InvalidSpecies(String),

    #[error("Model unavailable: {0}")]
    ModelUnavailable(#[from] ModelUnavailable),
}

/// Why the classifier could not produce scores for a request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelUnavailable {
    #[error("model is not loaded")]
    NotLoaded,

    #[error("inference backend failed: {0}")]
    Backend(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("all workers busy and queue full ({queue_depth} pending)")]
    Saturated { queue_depth: usize },
}

/// Stable discriminant for callers that map errors onto their own surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Decode,
    Shape,
    InvalidSpecies,
    ModelUnavailable,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Decode => "decode_error",
            ErrorKind::Shape => "shape_error",
            ErrorKind::InvalidSpecies => "invalid_species",
            ErrorKind::ModelUnavailable => "model_unavailable",
        }
    }
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Decode(_) => ErrorKind::Decode,
            PipelineError::Shape(_) => ErrorKind::Shape,
            PipelineError::InvalidSpecies(_) => ErrorKind::InvalidSpecies,
            PipelineError::ModelUnavailable(_) => ErrorKind::ModelUnavailable,
        }
    }

    /// True when the request ran out of time rather than failing outright.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            PipelineError::ModelUnavailable(ModelUnavailable::Timeout(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_distinct() {
        let errors = [
            PipelineError::Decode("x".into()),
            PipelineError::Shape("x".into()),
            PipelineError::InvalidSpecies("x".into()),
            PipelineError::ModelUnavailable(ModelUnavailable::NotLoaded),
        ];
        let mut codes: Vec<&str> = errors.iter().map(|e| e.kind().as_str()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), 4);
    }

    #[test]
    fn timeout_is_model_unavailable() {
        let err: PipelineError = ModelUnavailable::Timeout(Duration::from_secs(3)).into();
        assert_eq!(err.kind(), ErrorKind::ModelUnavailable);
        assert!(err.is_timeout());
        assert!(err.to_string().contains("timed out"));
    }
}

//! Pairs raw classifier scores with labels and ranks them.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::error::PipelineError;
use crate::labels::LabelSet;
use crate::species::{CryState, Species};

/// Round to 4 decimal places, half away from zero.
///
/// Python's `round(x, 4)` breaks exact binary ties to even instead, so the
/// two differ only when `x * 10^4` lands exactly on `.5` (`0.03125` gives
/// `0.0313` here and `0.0312` there). Every other value rounds the same.
#[inline]
pub fn round4(value: f32) -> f32 {
    ((value as f64) * 10_000.0).round() as f32 / 10_000.0
}

/// Ordered label → probability mapping, highest first.
///
/// Equal values keep the order of the label set they were ranked against.
/// Serializes as a JSON object whose key order is the ranking order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PredictionMap {
    entries: Vec<(String, f32)>,
}

impl PredictionMap {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.entries.iter().map(|(l, v)| (l.as_str(), *v))
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(l, _)| l.as_str())
    }

    pub fn get(&self, label: &str) -> Option<f32> {
        self.entries
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| *v)
    }

    /// Highest-ranked entry.
    pub fn top(&self) -> Option<(&str, f32)> {
        self.entries.first().map(|(l, v)| (l.as_str(), *v))
    }

    /// Same ranking with known cry states renamed to their Korean display
    /// names. Unknown labels are kept verbatim.
    pub fn localized(&self) -> PredictionMap {
        let entries = self
            .entries
            .iter()
            .map(|(label, v)| {
                let shown = CryState::from_any(label)
                    .map(|s| s.korean().to_string())
                    .unwrap_or_else(|| label.clone());
                (shown, *v)
            })
            .collect();
        PredictionMap { entries }
    }
}

impl Serialize for PredictionMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (label, value) in &self.entries {
            map.serialize_entry(label, value)?;
        }
        map.end()
    }
}

/// Rank `scores` against `labels`.
///
/// Index `i` of `scores` pairs with index `i` of `labels`. Values are rounded
/// to 4 decimals and passed through otherwise (no re-normalization). The sort
/// is stable so ties keep label-set order.
pub fn rank(scores: &[f32], labels: &LabelSet) -> Result<PredictionMap, PipelineError> {
    if scores.len() != labels.len() {
        return Err(PipelineError::Shape(format!(
            "classifier returned {} scores for {} labels",
            scores.len(),
            labels.len()
        )));
    }

    let mut entries: Vec<(String, f32)> = labels
        .iter()
        .zip(scores)
        .map(|(label, &score)| (label.to_string(), round4(score)))
        .collect();

    entries.sort_by(|a, b| b.1.total_cmp(&a.1));

    Ok(PredictionMap { entries })
}

/// A ranked result plus the context it was produced in.
#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    /// Species whose label set was used; `None` means the generic set.
    pub species: Option<Species>,
    /// Label of the highest-ranked entry.
    pub top_state: Option<String>,
    /// Duration of the decoded recording in seconds, before windowing.
    pub duration_secs: f32,
    pub predictions: PredictionMap,
}

impl Prediction {
    pub fn new(species: Option<Species>, duration_secs: f32, predictions: PredictionMap) -> Self {
        let top_state = predictions.top().map(|(l, _)| l.to_string());
        Self {
            species,
            top_state,
            duration_secs,
            predictions,
        }
    }
}

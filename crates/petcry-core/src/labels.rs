//! Species-conditioned label sets.
//!
//! A [`LabelSet`] is positionally significant: index `i` names the
//! classifier's `i`-th raw score. [`LabelMapper`] picks the set for a
//! request's species, falling back to the generic set unless the caller
//! asked for [`SpeciesPolicy::Strict`].

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::species::{CryState, Species};

/// Ordered, species-specific state names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelSet {
    labels: Vec<String>,
}

impl LabelSet {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    /// The canonical training order: anger, hunger, lonely.
    pub fn canonical() -> Self {
        Self::new(CryState::CANONICAL.iter().map(|s| s.as_str()))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    pub fn position(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.position(label).is_some()
    }

    /// Labels become result keys, so each must be non-blank and unique.
    pub fn validate(&self) -> Result<(), String> {
        let mut seen = HashSet::with_capacity(self.labels.len());
        for (i, label) in self.labels.iter().enumerate() {
            if label.trim().is_empty() {
                return Err(format!("label {} is blank", i));
            }
            if !seen.insert(label.as_str()) {
                return Err(format!("label '{}' appears more than once", label));
            }
        }
        Ok(())
    }
}

/// What to do with a species tag that names no known species.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeciesPolicy {
    /// Unknown tags use the generic label set.
    #[default]
    Fallback,
    /// Unknown tags are rejected with `InvalidSpecies`. An absent tag still
    /// resolves to the generic set.
    Strict,
}

/// Per-species label set overrides, typically read from a model manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dog: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cat: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generic: Option<Vec<String>>,
}

/// Resolves the label set for a species tag.
#[derive(Debug, Clone)]
pub struct LabelMapper {
    dog: LabelSet,
    cat: LabelSet,
    generic: LabelSet,
    policy: SpeciesPolicy,
}

impl Default for LabelMapper {
    fn default() -> Self {
        Self {
            dog: LabelSet::canonical(),
            cat: LabelSet::canonical(),
            generic: LabelSet::canonical(),
            policy: SpeciesPolicy::Fallback,
        }
    }
}

impl LabelMapper {
    pub fn new(dog: LabelSet, cat: LabelSet, generic: LabelSet) -> Self {
        Self {
            dog,
            cat,
            generic,
            policy: SpeciesPolicy::Fallback,
        }
    }

    /// Canonical sets with any manifest overrides applied.
    pub fn with_overrides(overrides: &LabelOverrides) -> Self {
        let pick = |o: &Option<Vec<String>>| {
            o.as_ref()
                .map(|labels| LabelSet::new(labels.iter().cloned()))
                .unwrap_or_else(LabelSet::canonical)
        };
        Self::new(
            pick(&overrides.dog),
            pick(&overrides.cat),
            pick(&overrides.generic),
        )
    }

    pub fn with_policy(mut self, policy: SpeciesPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> SpeciesPolicy {
        self.policy
    }

    pub fn labels_for(&self, species: Option<Species>) -> &LabelSet {
        match species {
            Some(Species::Dog) => &self.dog,
            Some(Species::Cat) => &self.cat,
            None => &self.generic,
        }
    }

    /// Resolve a raw species tag to `(species, label set)`.
    ///
    /// `None` or a blank tag selects the generic set under either policy.
    pub fn resolve(
        &self,
        tag: Option<&str>,
    ) -> Result<(Option<Species>, &LabelSet), PipelineError> {
        let tag = match tag.map(str::trim) {
            None | Some("") => return Ok((None, &self.generic)),
            Some(t) => t,
        };

        match Species::parse(tag) {
            Some(species) => Ok((Some(species), self.labels_for(Some(species)))),
            None if self.policy == SpeciesPolicy::Strict => Err(PipelineError::InvalidSpecies(
                format!("'{}' is not a recognized species (expected dog or cat)", tag),
            )),
            None => Ok((None, &self.generic)),
        }
    }

    /// Check that `state` (English or Korean) is valid for `species` and
    /// return the label as it appears in the species' set.
    pub fn validate_state(
        &self,
        species: Option<Species>,
        state: &str,
    ) -> Result<String, PipelineError> {
        let labels = self.labels_for(species);
        let canonical = CryState::from_any(state)
            .map(|s| s.as_str().to_string())
            .unwrap_or_else(|| state.trim().to_string());

        if labels.contains(&canonical) {
            return Ok(canonical);
        }

        let allowed: Vec<&str> = labels.iter().collect();
        let who = species.map(|s| s.as_str()).unwrap_or("generic");
        Err(PipelineError::InvalidSpecies(format!(
            "state '{}' is not valid for {}; allowed: {}",
            state,
            who,
            allowed.join(", ")
        )))
    }

    /// Every configured set, tagged with the species name it belongs to.
    pub fn sets(&self) -> [(&'static str, &LabelSet); 3] {
        [
            ("dog", &self.dog),
            ("cat", &self.cat),
            ("generic", &self.generic),
        ]
    }
}

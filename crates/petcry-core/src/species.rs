//! Species tags and cry states, with their Korean display names.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Species with a dedicated label set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Species {
    Dog,
    Cat,
}

impl Species {
    pub const ALL: [Species; 2] = [Species::Dog, Species::Cat];

    pub fn as_str(self) -> &'static str {
        match self {
            Species::Dog => "dog",
            Species::Cat => "cat",
        }
    }

    pub fn korean(self) -> &'static str {
        match self {
            Species::Dog => "개",
            Species::Cat => "고양이",
        }
    }

    /// Parse an English or Korean species name. Case and surrounding
    /// whitespace are ignored.
    pub fn parse(tag: &str) -> Option<Species> {
        let tag = tag.trim();
        Species::ALL.into_iter().find(|s| {
            s.as_str().eq_ignore_ascii_case(tag) || s.korean() == tag
        })
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Species {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Species::parse(s).ok_or_else(|| format!("unknown species '{}'", s))
    }
}

/// Canonical cry states, in the order the classifier was trained on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CryState {
    Anger,
    Hunger,
    Lonely,
}

impl CryState {
    pub const CANONICAL: [CryState; 3] = [CryState::Anger, CryState::Hunger, CryState::Lonely];

    pub fn as_str(self) -> &'static str {
        match self {
            CryState::Anger => "anger",
            CryState::Hunger => "hunger",
            CryState::Lonely => "lonely",
        }
    }

    pub fn korean(self) -> &'static str {
        match self {
            CryState::Anger => "화남",
            CryState::Hunger => "배고픔",
            CryState::Lonely => "외로움",
        }
    }

    /// Accepts either the English key or the Korean display name.
    pub fn from_any(name: &str) -> Option<CryState> {
        let name = name.trim();
        CryState::CANONICAL
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(name) || s.korean() == name)
    }
}

impl fmt::Display for CryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

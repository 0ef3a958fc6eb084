//! Petcry Core – species, cry states, label sets, and prediction ranking
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐    ┌──────────────────┐    ┌────────────────┐
//! │  species tag  │───▶│   LabelMapper    │───▶│    LabelSet    │
//! └───────────────┘    │ dog / cat / any  │    └───────┬────────┘
//!                      └──────────────────┘            │
//! ┌───────────────┐                                    ▼
//! │ raw scores[]  │──────────────────────────▶┌────────────────┐
//! └───────────────┘                           │  ResultRanker  │──▶ PredictionMap
//!                                             └────────────────┘
//! ```
//!
//! Everything in this crate is pure and allocation-light. Audio decoding,
//! feature extraction and inference live in `petcry-neural`.

pub mod error;
pub mod labels;
pub mod ranking;
pub mod species;

pub use error::{ErrorKind, ModelUnavailable, PipelineError};
pub use labels::{LabelMapper, LabelOverrides, LabelSet, SpeciesPolicy};
pub use ranking::{rank, round4, Prediction, PredictionMap};
pub use species::{CryState, Species};

//! Console rendering of classification results

use std::fmt::Write;
use std::path::Path;

use serde::Serialize;

use petcry_core::{PipelineError, Prediction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// One line of `classify` output.
#[derive(Debug, Serialize)]
pub struct FileReport<'a> {
    pub file: &'a str,
    #[serde(flatten)]
    pub outcome: Outcome<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Outcome<'a> {
    Ok(&'a Prediction),
    Err { code: &'static str, message: String },
}

impl<'a> FileReport<'a> {
    pub fn new(file: &'a Path, result: &'a Result<Prediction, PipelineError>) -> Self {
        let file = file.to_str().unwrap_or("<non-utf8 path>");
        let outcome = match result {
            Ok(prediction) => Outcome::Ok(prediction),
            Err(err) => Outcome::Err {
                code: err.kind().as_str(),
                message: err.to_string(),
            },
        };
        Self { file, outcome }
    }

    pub fn render(&self, format: OutputFormat, korean: bool) -> String {
        match format {
            OutputFormat::Json => self.render_json(korean),
            OutputFormat::Text => self.render_text(korean),
        }
    }

    fn render_json(&self, korean: bool) -> String {
        let localized;
        let report = match (&self.outcome, korean) {
            (Outcome::Ok(prediction), true) => {
                localized = Prediction::new(
                    prediction.species,
                    prediction.duration_secs,
                    prediction.predictions.localized(),
                );
                FileReport {
                    file: self.file,
                    outcome: Outcome::Ok(&localized),
                }
            }
            (Outcome::Ok(prediction), false) => FileReport {
                file: self.file,
                outcome: Outcome::Ok(prediction),
            },
            (Outcome::Err { code, message }, _) => FileReport {
                file: self.file,
                outcome: Outcome::Err {
                    code: *code,
                    message: message.clone(),
                },
            },
        };
        serde_json::to_string(&report).unwrap_or_else(|e| format!("{{\"error\":\"{}\"}}", e))
    }

    fn render_text(&self, korean: bool) -> String {
        let mut out = String::new();
        match &self.outcome {
            Outcome::Ok(prediction) => {
                let map = if korean {
                    prediction.predictions.localized()
                } else {
                    prediction.predictions.clone()
                };
                let species = prediction.species.map(|s| s.as_str()).unwrap_or("generic");
                let _ = write!(
                    out,
                    "{} [{}, {:.2}s]:",
                    self.file, species, prediction.duration_secs
                );
                for (label, score) in map.iter() {
                    let _ = write!(out, " {}={:.4}", label, score);
                }
            }
            Outcome::Err { code, message } => {
                let _ = write!(out, "{}: {} ({})", self.file, message, code);
            }
        }
        out
    }
}

//! Model directory management
//!
//! A model directory holds `classifier.onnx` plus `model-manifest.json`,
//! which pins the artifact's SHA-256 and declares its input contract. Hashes
//! are captured when a model is staged (trust on first use) and enforced on
//! every load. Nothing here touches the network.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use petcry_core::{LabelOverrides, LabelSet};

const CLASSIFIER_FILE: &str = "classifier.onnx";
const MANIFEST_FILE: &str = "model-manifest.json";
const MANIFEST_VERSION: u32 = 1;

/// Environment override for the model directory (air-gapped installs).
pub const MODEL_DIR_ENV: &str = "PETCRY_MODEL_DIR";

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Checksum mismatch for {path:?}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },
    #[error("Required model file missing: {0}")]
    ModelMissing(PathBuf),
    #[error("Model manifest missing: {0}")]
    ManifestMissing(PathBuf),
    #[error("Model manifest invalid at {path:?}: {reason}")]
    ManifestInvalid { path: PathBuf, reason: String },
}

/// Declared contract of a staged classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelManifest {
    pub version: u32,
    pub classifier_sha256: String,
    /// `[1, bands, frames, channels]`
    pub input_shape: [usize; 4],
    pub num_classes: usize,
    #[serde(default)]
    pub labels: LabelOverrides,
}

impl ModelManifest {
    fn validate(&self, path: &Path) -> Result<(), ModelError> {
        let invalid = |reason: String| ModelError::ManifestInvalid {
            path: path.to_path_buf(),
            reason,
        };
        if self.version != MANIFEST_VERSION {
            return Err(invalid(format!("unsupported version {}", self.version)));
        }
        if self.num_classes == 0 {
            return Err(invalid("num_classes must be at least 1".to_string()));
        }
        if self.input_shape.iter().any(|&d| d == 0) {
            return Err(invalid(format!(
                "input_shape {:?} has a zero dimension",
                self.input_shape
            )));
        }
        if self.classifier_sha256.len() != 64 {
            return Err(invalid("classifier_sha256 is not a SHA-256 hex digest".to_string()));
        }
        let overrides = [
            ("dog", &self.labels.dog),
            ("cat", &self.labels.cat),
            ("generic", &self.labels.generic),
        ];
        for (species, labels) in overrides {
            if let Some(labels) = labels {
                LabelSet::new(labels.iter().cloned())
                    .validate()
                    .map_err(|reason| invalid(format!("{} labels: {}", species, reason)))?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ModelManager {
    root: PathBuf,
}

impl Default for ModelManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelManager {
    pub fn from_dir(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn new() -> Self {
        if let Ok(p) = std::env::var(MODEL_DIR_ENV) {
            return Self::from_dir(PathBuf::from(p));
        }

        if let Some(dirs) = ProjectDirs::from("com", "petcry", "petcry") {
            Self::from_dir(dirs.cache_dir().join("models"))
        } else {
            Self::from_dir(PathBuf::from(".petcry/models"))
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    #[inline]
    pub fn classifier_path(&self) -> PathBuf {
        self.root.join(CLASSIFIER_FILE)
    }

    #[inline]
    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    pub fn load_manifest(&self) -> Result<ModelManifest, ModelError> {
        let path = self.manifest_path();
        if !path.exists() {
            return Err(ModelError::ManifestMissing(path));
        }
        let bytes = fs::read(&path)?;
        let manifest: ModelManifest =
            serde_json::from_slice(&bytes).map_err(|e| ModelError::ManifestInvalid {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        manifest.validate(&path)?;
        Ok(manifest)
    }

    fn write_manifest(&self, manifest: &ModelManifest) -> Result<(), ModelError> {
        let path = self.manifest_path();
        let tmp_path = self.root.join(format!("{}.tmp", MANIFEST_FILE));
        let payload =
            serde_json::to_vec_pretty(manifest).map_err(|e| ModelError::ManifestInvalid {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        let mut file = File::create(&tmp_path)?;
        file.write_all(&payload)?;
        file.sync_all()?;
        fs::rename(&tmp_path, &path)?;
        sync_parent_dir(&path)?;
        Ok(())
    }

    /// Copy `source` into the directory and record its hash and contract.
    ///
    /// Replaces any previously staged model. The copy lands under a temporary
    /// name first, so a crash never leaves a half-written `classifier.onnx`
    /// next to a manifest that describes it.
    pub fn stage(
        &self,
        source: &Path,
        input_shape: [usize; 4],
        num_classes: usize,
        labels: LabelOverrides,
    ) -> Result<ModelManifest, ModelError> {
        if !source.exists() {
            return Err(ModelError::ModelMissing(source.to_path_buf()));
        }
        fs::create_dir_all(&self.root)?;

        let dest = self.classifier_path();
        let tmp_path = dest.with_extension("onnx.tmp");
        fs::copy(source, &tmp_path)?;
        File::open(&tmp_path)?.sync_all()?;
        fs::rename(&tmp_path, &dest)?;
        sync_parent_dir(&dest)?;

        let manifest = ModelManifest {
            version: MANIFEST_VERSION,
            classifier_sha256: compute_sha256(&dest)?,
            input_shape,
            num_classes,
            labels,
        };
        manifest.validate(&self.manifest_path())?;
        self.write_manifest(&manifest)?;

        // Catch I/O races or corruption before anyone loads it.
        self.verify_expected_hash(&dest, &manifest.classifier_sha256)?;
        tracing::info!(
            "Staged classifier {:?} -> {:?} (sha256 {})",
            source,
            dest,
            manifest.classifier_sha256
        );
        Ok(manifest)
    }

    fn verify_expected_hash(&self, path: &Path, expected: &str) -> Result<(), ModelError> {
        let actual = compute_sha256(path)?;
        if actual == expected {
            Ok(())
        } else {
            Err(ModelError::ChecksumMismatch {
                path: path.to_path_buf(),
                expected: expected.to_string(),
                actual,
            })
        }
    }

    /// Verified classifier path and its manifest.
    pub fn classifier_offline(&self) -> Result<(PathBuf, ModelManifest), ModelError> {
        let manifest = self.load_manifest()?;
        let path = self.classifier_path();
        if !path.exists() {
            return Err(ModelError::ModelMissing(path));
        }
        self.verify_expected_hash(&path, &manifest.classifier_sha256)?;
        Ok((path, manifest))
    }

    pub fn verify_hash(path: &Path, expected: &str) -> Result<bool, ModelError> {
        Ok(compute_sha256(path)? == expected)
    }
}

fn compute_sha256(path: &Path) -> Result<String, ModelError> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

fn sync_parent_dir(path: &Path) -> Result<(), ModelError> {
    #[cfg(unix)]
    {
        if let Some(parent) = path.parent() {
            File::open(parent)?.sync_all()?;
        }
    }
    Ok(())
}

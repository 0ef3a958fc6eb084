//! Binary-level checks that need no trained model.

use std::path::Path;
use std::process::{Command, Output};

use tempfile::tempdir;

fn petcry(args: &[&str], model_dir: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_petcry"))
        .args(args)
        .arg("--model-dir")
        .arg(model_dir)
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run petcry")
}

fn write_wav(path: &Path) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for i in 0..16000 {
        writer.write_sample(((i % 80) as i16 - 40) * 300).unwrap();
    }
    writer.finalize().unwrap();
}

#[test]
fn setup_model_writes_manifest() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("trained.onnx");
    std::fs::write(&source, b"not really onnx").unwrap();
    let models = dir.path().join("models");

    let output = petcry(
        &["setup-model", "--source", source.to_str().unwrap(), "--num-classes", "3"],
        &models,
    );
    assert!(output.status.success(), "{:?}", output);

    let manifest: serde_json::Value =
        serde_json::from_slice(&std::fs::read(models.join("model-manifest.json")).unwrap())
            .unwrap();
    assert_eq!(manifest["num_classes"], 3);
    assert_eq!(manifest["input_shape"], serde_json::json!([1, 128, 862, 3]));
    assert_eq!(manifest["classifier_sha256"].as_str().unwrap().len(), 64);
}

#[test]
fn classify_without_model_fails_fast() {
    let dir = tempdir().unwrap();
    let audio = dir.path().join("cry.wav");
    write_wav(&audio);

    let output = petcry(&["classify", audio.to_str().unwrap()], &dir.path().join("empty"));
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("manifest"), "stderr: {}", stderr);
}

#[test]
fn broken_model_is_a_startup_failure() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("trained.onnx");
    std::fs::write(&source, b"garbage bytes").unwrap();
    let models = dir.path().join("models");
    let staged = petcry(&["setup-model", "--source", source.to_str().unwrap()], &models);
    assert!(staged.status.success());

    let output = petcry(&["inspect"], &models);
    assert!(!output.status.success());
    assert!(!String::from_utf8_lossy(&output.stdout).contains("contract ok"));
}

#[test]
fn tampered_model_is_rejected() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("trained.onnx");
    std::fs::write(&source, b"original").unwrap();
    let models = dir.path().join("models");
    assert!(petcry(&["setup-model", "--source", source.to_str().unwrap()], &models)
        .status
        .success());

    std::fs::write(models.join("classifier.onnx"), b"swapped").unwrap();
    let audio = dir.path().join("cry.wav");
    write_wav(&audio);
    let output = petcry(&["classify", audio.to_str().unwrap()], &models);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Checksum mismatch"), "stderr: {}", stderr);
}

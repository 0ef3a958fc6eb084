//! End-to-end pipeline behaviour with a scripted classifier.

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use petcry_core::{ErrorKind, LabelMapper, LabelSet, PipelineError, Species, SpeciesPolicy};
use petcry_neural::{
    Classifier, CryPipeline, FeatureConfig, InferenceError, InputTensor, ShortInputPolicy,
    StartupError,
};

/// Returns fixed scores and records every tensor it sees.
struct Scripted {
    scores: Vec<f32>,
    calls: AtomicUsize,
    last_input: std::sync::Mutex<Option<Vec<f32>>>,
}

impl Scripted {
    fn new(scores: Vec<f32>) -> Arc<Self> {
        Arc::new(Self {
            scores,
            calls: AtomicUsize::new(0),
            last_input: std::sync::Mutex::new(None),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_input(&self) -> Vec<f32> {
        self.last_input.lock().unwrap().clone().unwrap()
    }
}

impl Classifier for Scripted {
    fn input_shape(&self) -> [usize; 4] {
        FeatureConfig::default().input_shape()
    }

    fn num_classes(&self) -> usize {
        self.scores.len()
    }

    fn classify(&self, input: &InputTensor) -> Result<Vec<f32>, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_input.lock().unwrap() = Some(input.to_vec());
        Ok(self.scores.clone())
    }
}

fn wav_i16(samples: &[i16], sample_rate: u32, channels: u16) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

fn noise(seed: u64, len: usize) -> Vec<i16> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.gen_range(-8000i16..8000)).collect()
}

fn pipeline_with(classifier: Arc<Scripted>, labels: LabelMapper) -> CryPipeline {
    CryPipeline::new(classifier, labels, FeatureConfig::default()).unwrap()
}

fn abc_generic() -> LabelMapper {
    LabelMapper::new(
        LabelSet::new(["A", "B", "C"]),
        LabelSet::new(["A", "B", "C"]),
        LabelSet::new(["A", "B", "C"]),
    )
}

#[test]
fn scores_are_paired_and_ranked() {
    let classifier = Scripted::new(vec![0.1, 0.7, 0.2]);
    let pipeline = pipeline_with(classifier.clone(), abc_generic());

    let prediction = pipeline
        .predict(&wav_i16(&noise(1, 32000), 16000, 1), None)
        .unwrap();

    let entries: Vec<(&str, f32)> = prediction.predictions.iter().collect();
    assert_eq!(entries, vec![("B", 0.7), ("C", 0.2), ("A", 0.1)]);
    assert_eq!(classifier.calls(), 1);

    let json = serde_json::to_string(&prediction.predictions).unwrap();
    assert_eq!(json, r#"{"B":0.7,"C":0.2,"A":0.1}"#);
}

#[test]
fn undecodable_bytes_never_reach_the_classifier() {
    let classifier = Scripted::new(vec![0.2, 0.3, 0.5]);
    let pipeline = pipeline_with(classifier.clone(), LabelMapper::default());

    let err = pipeline
        .predict(b"this is plainly not audio data at all", None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decode);

    let err = pipeline.predict(&[], Some("dog")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decode);

    assert_eq!(classifier.calls(), 0);
}

#[test]
fn empty_recording_is_shape_error() {
    let classifier = Scripted::new(vec![0.2, 0.3, 0.5]);
    let pipeline = pipeline_with(classifier.clone(), LabelMapper::default());

    let err = pipeline.predict(&wav_i16(&[], 16000, 1), None).unwrap_err();
    assert!(matches!(err, PipelineError::Shape(_)), "got {:?}", err);
    assert_eq!(classifier.calls(), 0);
}

#[test]
fn short_recording_policy() {
    let audio = wav_i16(&noise(2, 4000), 16000, 1);

    let padded = pipeline_with(Scripted::new(vec![0.2, 0.3, 0.5]), LabelMapper::default());
    assert!(padded.predict(&audio, None).is_ok());

    let strict_features = FeatureConfig {
        short_input: ShortInputPolicy::Reject,
        ..FeatureConfig::default()
    };
    let strict = CryPipeline::new(
        Scripted::new(vec![0.2, 0.3, 0.5]),
        LabelMapper::default(),
        strict_features,
    )
    .unwrap();
    let err = strict.predict(&audio, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Shape);
}

#[test]
fn identical_input_gives_identical_output() {
    let classifier = Scripted::new(vec![0.25, 0.5, 0.25]);
    let pipeline = pipeline_with(classifier.clone(), LabelMapper::default());
    let audio = wav_i16(&noise(3, 40000), 22050, 1);

    let first = pipeline.predict(&audio, Some("cat")).unwrap();
    let first_input = classifier.last_input();
    let second = pipeline.predict(&audio, Some("cat")).unwrap();
    let second_input = classifier.last_input();

    assert_eq!(first.predictions, second.predictions);
    assert_eq!(first_input, second_input);
    assert_eq!(first.species, Some(Species::Cat));
}

#[test]
fn only_the_first_window_matters() {
    let classifier = Scripted::new(vec![0.2, 0.3, 0.5]);
    let pipeline = pipeline_with(classifier.clone(), LabelMapper::default());

    let head = noise(4, 32000);
    let mut long = head.clone();
    long.extend(noise(5, 32000));

    pipeline.predict(&wav_i16(&head, 16000, 1), None).unwrap();
    let head_input = classifier.last_input();
    let prediction = pipeline.predict(&wav_i16(&long, 16000, 1), None).unwrap();
    let long_input = classifier.last_input();

    assert_eq!(head_input, long_input);
    assert!((prediction.duration_secs - 4.0).abs() < 1e-3);
}

#[test]
fn long_recording_reports_full_duration_from_its_head() {
    let classifier = Scripted::new(vec![0.2, 0.3, 0.5]);
    let pipeline = pipeline_with(classifier.clone(), LabelMapper::default());

    let long = noise(9, 44100 * 30);
    let head = &long[..44100 * 3];

    pipeline.predict(&wav_i16(head, 44100, 1), None).unwrap();
    let head_input = classifier.last_input();
    let prediction = pipeline.predict(&wav_i16(&long, 44100, 1), None).unwrap();
    let long_input = classifier.last_input();

    assert_eq!(head_input, long_input);
    assert!((prediction.duration_secs - 30.0).abs() < 1e-3);
}

#[test]
fn stereo_input_is_accepted() {
    let classifier = Scripted::new(vec![0.2, 0.3, 0.5]);
    let pipeline = pipeline_with(classifier.clone(), LabelMapper::default());
    let audio = wav_i16(&noise(6, 2 * 44100), 44100, 2);

    let prediction = pipeline.predict(&audio, None).unwrap();
    assert_eq!(prediction.predictions.len(), 3);
    assert_eq!(
        classifier.last_input().len(),
        FeatureConfig::default().input_shape().iter().product::<usize>()
    );
}

#[test]
fn species_tags_select_label_sets() {
    let labels = LabelMapper::new(
        LabelSet::new(["bark", "whine", "growl"]),
        LabelSet::new(["meow", "hiss", "purr"]),
        LabelSet::canonical(),
    );
    let pipeline = pipeline_with(Scripted::new(vec![0.6, 0.3, 0.1]), labels);
    let audio = wav_i16(&noise(7, 16000), 16000, 1);

    let dog = pipeline.predict(&audio, Some("DOG")).unwrap();
    assert_eq!(dog.top_state.as_deref(), Some("bark"));

    let cat = pipeline.predict(&audio, Some("고양이")).unwrap();
    assert_eq!(cat.top_state.as_deref(), Some("meow"));

    let other = pipeline.predict(&audio, Some("parrot")).unwrap();
    assert_eq!(other.top_state.as_deref(), Some("anger"));
    assert_eq!(other.species, None);
}

#[test]
fn strict_policy_rejects_unknown_species() {
    let classifier = Scripted::new(vec![0.6, 0.3, 0.1]);
    let labels = LabelMapper::default().with_policy(SpeciesPolicy::Strict);
    let pipeline = pipeline_with(classifier, labels);
    let audio = wav_i16(&noise(8, 16000), 16000, 1);

    let err = pipeline.predict(&audio, Some("parrot")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidSpecies);
    assert!(pipeline.predict(&audio, None).is_ok());
}

#[test]
fn startup_validates_label_counts() {
    let labels = LabelMapper::new(
        LabelSet::new(["bark", "whine"]),
        LabelSet::canonical(),
        LabelSet::canonical(),
    );
    let err = CryPipeline::new(
        Scripted::new(vec![0.6, 0.3, 0.1]),
        labels,
        FeatureConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        StartupError::LabelCount {
            species: "dog",
            labels: 2,
            classes: 3
        }
    ));
}

#[test]
fn silent_clip_end_to_end() {
    let classifier = Scripted::new(vec![0.1, 0.7, 0.2]);
    let pipeline = pipeline_with(classifier.clone(), abc_generic());

    let prediction = pipeline
        .predict(&wav_i16(&vec![0; 32000], 16000, 1), Some(""))
        .unwrap();

    let entries: Vec<(&str, f32)> = prediction.predictions.iter().collect();
    assert_eq!(entries, vec![("B", 0.7), ("C", 0.2), ("A", 0.1)]);
    assert!(classifier.last_input().iter().all(|&v| v == 0.0));
}

#[test]
fn silent_four_seconds_matches_two_seconds() {
    let classifier = Scripted::new(vec![0.2, 0.3, 0.5]);
    let pipeline = pipeline_with(classifier.clone(), LabelMapper::default());

    let two = pipeline.predict(&wav_i16(&vec![0; 32000], 16000, 1), None).unwrap();
    let two_input = classifier.last_input();
    let four = pipeline.predict(&wav_i16(&vec![0; 64000], 16000, 1), None).unwrap();
    let four_input = classifier.last_input();

    assert_eq!(two_input, four_input);
    assert_eq!(two.predictions, four.predictions);
}

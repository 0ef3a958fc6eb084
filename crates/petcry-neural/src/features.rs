//! Log-mel feature extraction
//!
//! Waveform → 2 s window → mel power spectrogram → dB relative to peak →
//! anti-aliased resize of the time axis by `862/64`.
//!
//! The constants below are the input contract of the trained classifier.
//! [`FeatureConfig::input_shape`] derives the tensor shape they produce, and
//! the pipeline refuses to start when a classifier declares anything else.

use ndarray::Array2;

use petcry_core::PipelineError;

use crate::decoder::Waveform;
use crate::resize::resize_antialiased;
use crate::spectrogram::{mel_filterbank, power_to_db, StftProcessor, AMIN, TOP_DB};
use crate::windowing::{ClipWindow, ShortInputPolicy};

pub const TARGET_SAMPLE_RATE: u32 = 16000;
pub const WINDOW_SECONDS: u32 = 2;
pub const N_MELS: usize = 128;
pub const N_FFT: usize = 2048;
pub const HOP_LENGTH: usize = 501;
/// Time-axis stretch from the 64 native frames to the 862 columns the
/// classifier was trained on.
pub const RESIZE_NUMERATOR: usize = 862;
pub const RESIZE_DENOMINATOR: usize = 64;
pub const CHANNELS: usize = 3;

/// `[bands, frames]` log-power map.
pub type FeatureMap = Array2<f32>;

/// Front-end parameters. Defaults are the trained model's contract.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureConfig {
    pub sample_rate: u32,
    pub window_secs: u32,
    pub n_mels: usize,
    pub n_fft: usize,
    pub hop_length: usize,
    pub resize_ratio: (usize, usize),
    pub channels: usize,
    pub top_db: f32,
    pub short_input: ShortInputPolicy,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            sample_rate: TARGET_SAMPLE_RATE,
            window_secs: WINDOW_SECONDS,
            n_mels: N_MELS,
            n_fft: N_FFT,
            hop_length: HOP_LENGTH,
            resize_ratio: (RESIZE_NUMERATOR, RESIZE_DENOMINATOR),
            channels: CHANNELS,
            top_db: TOP_DB,
            short_input: ShortInputPolicy::ZeroPad,
        }
    }
}

impl FeatureConfig {
    pub fn window_samples(&self) -> usize {
        self.sample_rate as usize * self.window_secs as usize
    }

    /// Frames produced for one full window before resizing.
    pub fn native_frames(&self) -> usize {
        1 + self.window_samples() / self.hop_length.max(1)
    }

    /// Frames after the time-axis resize.
    pub fn resized_frames(&self, frames: usize) -> usize {
        let (num, den) = self.resize_ratio;
        (frames as f64 * num as f64 / den.max(1) as f64).round() as usize
    }

    /// Tensor shape this configuration feeds the classifier.
    pub fn input_shape(&self) -> [usize; 4] {
        [
            1,
            self.n_mels,
            self.resized_frames(self.native_frames()),
            self.channels,
        ]
    }
}

/// Immutable extractor; build once and share across requests.
#[derive(Debug)]
pub struct FeatureExtractor {
    config: FeatureConfig,
    window: ClipWindow,
    stft: StftProcessor,
    mel_basis: Array2<f32>,
}

impl FeatureExtractor {
    pub fn new(config: FeatureConfig) -> Self {
        let window = ClipWindow::new(config.sample_rate, config.window_secs, config.short_input);
        let stft = StftProcessor::new(config.n_fft, config.hop_length);
        let mel_basis = mel_filterbank(
            config.sample_rate,
            config.n_fft,
            config.n_mels,
            0.0,
            config.sample_rate as f64 / 2.0,
        );
        Self {
            config,
            window,
            stft,
            mel_basis,
        }
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Log-mel spectrogram of the clipped window, before resizing.
    pub fn log_mel(&self, waveform: &Waveform) -> Result<FeatureMap, PipelineError> {
        if waveform.sample_rate != self.config.sample_rate {
            return Err(PipelineError::Shape(format!(
                "waveform is {} Hz, extractor expects {} Hz",
                waveform.sample_rate, self.config.sample_rate
            )));
        }

        let clip = self.window.apply(&waveform.samples)?;
        let power = self.stft.power_spectrogram(&clip);
        if power.ncols() == 0 {
            return Err(PipelineError::Shape("spectrogram has zero frames".into()));
        }

        let mut mel = self.mel_basis.dot(&power);
        if mel.nrows() == 0 {
            return Err(PipelineError::Shape("spectrogram has zero mel bands".into()));
        }

        power_to_db(&mut mel, AMIN, self.config.top_db);
        Ok(mel)
    }

    /// Full feature map: log-mel resized along time to the classifier width.
    pub fn extract(&self, waveform: &Waveform) -> Result<FeatureMap, PipelineError> {
        let mel = self.log_mel(waveform)?;
        let (bands, frames) = mel.dim();
        let target_frames = self.config.resized_frames(frames);

        resize_antialiased(&mel, bands, target_frames).ok_or_else(|| {
            PipelineError::Shape(format!(
                "cannot resize {}x{} feature map to {}x{}",
                bands, frames, bands, target_frames
            ))
        })
    }
}

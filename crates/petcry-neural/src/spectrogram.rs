//! STFT and Mel Spectrogram computation using rustfft
//!
//! Matches the classic librosa front end the classifier was trained with:
//! centered frames with zero padding, periodic Hann window, power spectrum,
//! Slaney mel scale with area normalization, and dB relative to the clip peak.

use std::sync::Arc;

use ndarray::Array2;
use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// Default floor applied before taking logs
pub const AMIN: f32 = 1e-10;

/// Default dynamic range kept below the clip peak, in dB
pub const TOP_DB: f32 = 80.0;

/// Short-time Fourier transform with a planned FFT
///
/// Immutable once built, so one processor can serve many threads; scratch
/// buffers are allocated per call.
pub struct StftProcessor {
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
    hop_size: usize,
    window: Vec<f32>,
}

impl std::fmt::Debug for StftProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StftProcessor")
            .field("fft_size", &self.fft_size)
            .field("hop_size", &self.hop_size)
            .finish()
    }
}

impl StftProcessor {
    /// Create a new STFT processor
    ///
    /// # Arguments
    /// * `fft_size` - FFT window size (2048 for the cry classifier)
    /// * `hop_size` - Hop size between frames (501 for the cry classifier)
    pub fn new(fft_size: usize, hop_size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        // Periodic Hann window (divides by N, not N-1)
        let window: Vec<f32> = (0..fft_size)
            .map(|i| {
                0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / fft_size as f32).cos())
            })
            .collect();

        Self {
            fft,
            fft_size,
            hop_size: hop_size.max(1),
            window,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    pub fn num_bins(&self) -> usize {
        self.fft_size / 2 + 1
    }

    /// Frame count for `len` input samples with centered framing.
    pub fn num_frames(&self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        1 + len / self.hop_size
    }

    /// Compute the power spectrogram `|X|²` as `[bins, frames]`.
    ///
    /// Frames are centered: the signal is zero-padded by `fft_size / 2` on
    /// both sides, so frame `t` is centered on sample `t * hop_size`.
    pub fn power_spectrogram(&self, audio: &[f32]) -> Array2<f32> {
        let num_bins = self.num_bins();
        let num_frames = self.num_frames(audio.len());
        let mut spectrogram = Array2::<f32>::zeros((num_bins, num_frames));
        if num_frames == 0 {
            return spectrogram;
        }

        let pad = self.fft_size / 2;
        let mut padded = vec![0.0f32; audio.len() + 2 * pad];
        padded[pad..pad + audio.len()].copy_from_slice(audio);

        let mut fft_input = vec![Complex::new(0.0f32, 0.0); self.fft_size];
        let mut fft_scratch =
            vec![Complex::new(0.0f32, 0.0); self.fft.get_inplace_scratch_len()];

        for frame_idx in 0..num_frames {
            let start = frame_idx * self.hop_size;
            for i in 0..self.fft_size {
                fft_input[i] = Complex::new(padded[start + i] * self.window[i], 0.0);
            }

            self.fft.process_with_scratch(&mut fft_input, &mut fft_scratch);

            for (b, c) in fft_input[..num_bins].iter().enumerate() {
                spectrogram[[b, frame_idx]] = c.re * c.re + c.im * c.im;
            }
        }

        spectrogram
    }
}

/// Convert frequency in Hz to the Slaney mel scale
///
/// Linear below 1 kHz, logarithmic above.
#[inline]
pub fn hz_to_mel(hz: f64) -> f64 {
    const F_SP: f64 = 200.0 / 3.0;
    const MIN_LOG_HZ: f64 = 1000.0;
    const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;
    let logstep = 6.4f64.ln() / 27.0;

    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / logstep
    } else {
        hz / F_SP
    }
}

/// Convert Slaney mel to Hz
#[inline]
pub fn mel_to_hz(mel: f64) -> f64 {
    const F_SP: f64 = 200.0 / 3.0;
    const MIN_LOG_HZ: f64 = 1000.0;
    const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;
    let logstep = 6.4f64.ln() / 27.0;

    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (logstep * (mel - MIN_LOG_MEL)).exp()
    } else {
        F_SP * mel
    }
}

/// Create a Slaney-normalized mel filterbank `[n_mels, fft_size/2 + 1]`
///
/// Triangular filters between mel-spaced edges from `fmin` to `fmax`, each
/// scaled by `2 / (upper_hz - lower_hz)` so filters have equal area.
pub fn mel_filterbank(
    sample_rate: u32,
    fft_size: usize,
    n_mels: usize,
    fmin: f64,
    fmax: f64,
) -> Array2<f32> {
    let num_bins = fft_size / 2 + 1;

    let fft_freqs: Vec<f64> = (0..num_bins)
        .map(|k| k as f64 * sample_rate as f64 / fft_size as f64)
        .collect();

    let mel_min = hz_to_mel(fmin);
    let mel_max = hz_to_mel(fmax);
    let mel_edges: Vec<f64> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_min + (mel_max - mel_min) * i as f64 / (n_mels + 1) as f64))
        .collect();

    let mut filterbank = Array2::<f32>::zeros((n_mels, num_bins));

    for m in 0..n_mels {
        let lower = mel_edges[m];
        let center = mel_edges[m + 1];
        let upper = mel_edges[m + 2];
        let enorm = 2.0 / (upper - lower);

        for (b, &freq) in fft_freqs.iter().enumerate() {
            let rising = (freq - lower) / (center - lower);
            let falling = (upper - freq) / (upper - center);
            let weight = rising.min(falling).max(0.0);
            filterbank[[m, b]] = (weight * enorm) as f32;
        }
    }

    filterbank
}

/// Convert a power spectrogram to dB relative to its own maximum, in place.
///
/// `10·log10(max(S, amin)) − 10·log10(max(peak, amin))`, floored at
/// `top_db` below the loudest cell. An all-zero input maps to all zeros.
pub fn power_to_db(spec: &mut Array2<f32>, amin: f32, top_db: f32) {
    let peak = spec.iter().copied().fold(0.0f32, f32::max);
    let reference = 10.0 * peak.max(amin).log10();

    spec.mapv_inplace(|v| 10.0 * v.max(amin).log10() - reference);

    let ceiling = spec.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let floor = ceiling - top_db;
    spec.mapv_inplace(|v| v.max(floor));
}

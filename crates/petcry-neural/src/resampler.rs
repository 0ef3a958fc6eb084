//! Audio resampler using Rubato
//!
//! Normalizes all audio to the pipeline's target sample rate (16 kHz) so the
//! spectrogram parameters always see the rate the classifier was trained at.

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::NeuralError;

/// Default target sample rate
pub const DEFAULT_TARGET_SR: u32 = 16000;

const CHUNK_SIZE: usize = 1024;

const SINC_LEN: usize = 256;

/// Source samples past the last wanted instant that still shape the output.
/// The sinc kernel reaches `SINC_LEN / 2` samples ahead; this keeps twice that.
pub const RESAMPLE_LOOKAHEAD: usize = SINC_LEN;

/// Resample mono audio to a target sample rate
///
/// Uses Rubato's SincFixedIn, whose output is already centred on the input
/// (sample `k` of the output sits at time `k / target`). Input is zero-padded
/// past the end and the output is cut to `round(len * target / source)`
/// samples, so duration is preserved exactly. Matching rates return a copy.
pub fn resample(
    samples: &[f32],
    source_rate: u32,
    target_rate: u32,
) -> Result<Vec<f32>, NeuralError> {
    if source_rate == 0 || target_rate == 0 {
        return Err(NeuralError::Resampler(format!(
            "Invalid sample rates: {} -> {}",
            source_rate, target_rate
        )));
    }
    if source_rate == target_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let params = SincInterpolationParameters {
        sinc_len: SINC_LEN,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = target_rate as f64 / source_rate as f64;

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, CHUNK_SIZE, 1)
        .map_err(|e| NeuralError::Resampler(format!("Failed to create resampler: {}", e)))?;

    let expected_len = (samples.len() as f64 * ratio).round() as usize;
    let mut output = Vec::with_capacity(expected_len + CHUNK_SIZE);
    let mut pos = 0;

    // Keep feeding, zero-padded past the end, until the last sample is out.
    while output.len() < expected_len {
        let mut chunk = vec![0.0f32; CHUNK_SIZE];
        if pos < samples.len() {
            let end = (pos + CHUNK_SIZE).min(samples.len());
            chunk[..end - pos].copy_from_slice(&samples[pos..end]);
        }

        let input = vec![chunk];
        let resampled = resampler
            .process(&input, None)
            .map_err(|e| NeuralError::Resampler(format!("Resample failed: {}", e)))?;

        if let Some(channel) = resampled.first() {
            output.extend_from_slice(channel);
        }

        pos += CHUNK_SIZE;
    }

    output.truncate(expected_len);

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resample_same_rate() {
        let samples = vec![1.0, 2.0, 3.0, 4.0];
        let result = resample(&samples, 16000, 16000).unwrap();
        assert_eq!(result, samples);
    }

    #[test]
    fn test_resample_exact_length() {
        let sr = 44100;
        let samples: Vec<f32> = (0..sr)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / sr as f32).sin())
            .collect();

        let result = resample(&samples, sr as u32, 16000).unwrap();
        assert_eq!(result.len(), 16000);
    }

    #[test]
    fn test_resample_keeps_tone_aligned() {
        // A 200 Hz tone survives 48k → 16k with its zero crossings in place.
        let sr = 48000;
        let samples: Vec<f32> = (0..sr)
            .map(|i| (2.0 * std::f32::consts::PI * 200.0 * i as f32 / sr as f32).sin())
            .collect();
        let result = resample(&samples, sr as u32, 16000).unwrap();

        let mid = 8000;
        let expected = (2.0 * std::f32::consts::PI * 200.0 * mid as f32 / 16000.0).sin();
        assert!(
            (result[mid] - expected).abs() < 0.05,
            "got {}, expected {}",
            result[mid],
            expected
        );
    }

    #[test]
    fn test_resample_keeps_impulse_in_place() {
        // A click at 0.5 s must land on output sample 8000 for every source rate.
        for sr in [48000u32, 44100, 22050, 8000] {
            let mut samples = vec![0.0f32; sr as usize];
            samples[sr as usize / 2] = 1.0;

            let result = resample(&samples, sr, 16000).unwrap();
            assert_eq!(result.len(), 16000);

            let peak = result
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map(|(i, _)| i)
                .unwrap();
            assert!(
                peak.abs_diff(8000) <= 1,
                "{} Hz: peak at {}, expected 8000",
                sr,
                peak
            );
        }
    }

    #[test]
    fn test_resample_prefix_matches_full() {
        // Resampling a prefix with enough lookahead gives the same head as the
        // whole signal, so callers may stop decoding early.
        let sr = 44100usize;
        let samples: Vec<f32> = (0..sr * 3)
            .map(|i| (2.0 * std::f32::consts::PI * 330.0 * i as f32 / sr as f32).sin())
            .collect();

        let full = resample(&samples, sr as u32, 16000).unwrap();
        let prefix = resample(&samples[..sr + RESAMPLE_LOOKAHEAD], sr as u32, 16000).unwrap();

        for i in 0..16000 {
            assert!(
                (full[i] - prefix[i]).abs() < 1e-4,
                "sample {}: {} vs {}",
                i,
                full[i],
                prefix[i]
            );
        }
    }

    #[test]
    fn test_resample_rejects_zero_rate() {
        assert!(resample(&[0.0; 4], 0, 16000).is_err());
    }
}

//! Fixed-duration clip windowing
//!
//! The classifier sees exactly one window per request. Longer recordings are
//! truncated to their first `window_size` samples; shorter ones are handled
//! per [`ShortInputPolicy`]. The result is deterministic: the same waveform
//! always yields the same window.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use petcry_core::PipelineError;

/// How to treat a recording shorter than the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortInputPolicy {
    /// Append silence up to the window length.
    #[default]
    ZeroPad,
    /// Fail with a shape error.
    Reject,
}

/// A fixed-length window anchored at the start of the recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipWindow {
    /// Window size in samples
    pub window_size: usize,
    pub policy: ShortInputPolicy,
}

impl ClipWindow {
    pub fn new(sample_rate: u32, window_secs: u32, policy: ShortInputPolicy) -> Self {
        Self {
            window_size: sample_rate as usize * window_secs as usize,
            policy,
        }
    }

    /// Cut `samples` to exactly `window_size` samples.
    ///
    /// Borrows when the input is already long enough; allocates only to pad.
    pub fn apply<'a>(&self, samples: &'a [f32]) -> Result<Cow<'a, [f32]>, PipelineError> {
        if samples.is_empty() {
            return Err(PipelineError::Shape("input window is empty (0 samples)".into()));
        }

        if samples.len() >= self.window_size {
            return Ok(Cow::Borrowed(&samples[..self.window_size]));
        }

        match self.policy {
            ShortInputPolicy::ZeroPad => {
                let mut padded = Vec::with_capacity(self.window_size);
                padded.extend_from_slice(samples);
                padded.resize(self.window_size, 0.0);
                Ok(Cow::Owned(padded))
            }
            ShortInputPolicy::Reject => Err(PipelineError::Shape(format!(
                "recording has {} samples, window needs {}",
                samples.len(),
                self.window_size
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncates_long_input() {
        let window = ClipWindow::new(16000, 2, ShortInputPolicy::ZeroPad);
        let audio: Vec<f32> = (0..64000).map(|i| i as f32).collect();
        let clipped = window.apply(&audio).unwrap();
        assert_eq!(clipped.len(), 32000);
        assert!(matches!(clipped, Cow::Borrowed(_)));
        assert_eq!(&clipped[..], &audio[..32000]);
    }

    #[test]
    fn test_pads_short_input() {
        let window = ClipWindow::new(16000, 2, ShortInputPolicy::ZeroPad);
        let clipped = window.apply(&[0.5; 100]).unwrap();
        assert_eq!(clipped.len(), 32000);
        assert_eq!(clipped[99], 0.5);
        assert_eq!(clipped[100], 0.0);
    }

    #[test]
    fn test_rejects_short_input_when_asked() {
        let window = ClipWindow::new(16000, 2, ShortInputPolicy::Reject);
        let err = window.apply(&[0.5; 100]).unwrap_err();
        assert!(matches!(err, PipelineError::Shape(_)));
        assert!(window.apply(&vec![0.0; 32000]).is_ok());
    }

    #[test]
    fn test_empty_is_shape_error() {
        let window = ClipWindow::new(16000, 2, ShortInputPolicy::ZeroPad);
        assert!(matches!(
            window.apply(&[]),
            Err(PipelineError::Shape(_))
        ));
    }
}

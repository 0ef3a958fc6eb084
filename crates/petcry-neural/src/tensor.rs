//! Classifier input tensor
//!
//! The network was trained on image-like inputs, so the single-channel
//! feature map is replicated into three identical channels:
//! `[bands, frames]` → `[1, bands, frames, 3]`.

use ndarray::{Array4, Axis};

use petcry_core::PipelineError;

use crate::features::{FeatureMap, CHANNELS};

/// `[batch = 1, bands, frames, channels]`, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    data: Array4<f32>,
}

impl InputTensor {
    /// Build the tensor from a feature map with [`CHANNELS`] channels.
    pub fn from_feature_map(features: &FeatureMap) -> Result<Self, PipelineError> {
        Self::with_channels(features, CHANNELS)
    }

    pub fn with_channels(features: &FeatureMap, channels: usize) -> Result<Self, PipelineError> {
        let (bands, frames) = features.dim();
        if bands == 0 || frames == 0 || channels == 0 {
            return Err(PipelineError::Shape(format!(
                "degenerate feature map {}x{} ({} channels)",
                bands, frames, channels
            )));
        }

        let plane = features.view().insert_axis(Axis(0)).insert_axis(Axis(3));
        let data = plane
            .broadcast((1, bands, frames, channels))
            .ok_or_else(|| PipelineError::Shape("cannot broadcast feature map".into()))?
            .to_owned();

        Ok(Self { data })
    }

    /// Zero tensor of the given shape, used for warm-up runs.
    pub fn zeros(shape: [usize; 4]) -> Self {
        Self {
            data: Array4::zeros(shape),
        }
    }

    pub fn shape(&self) -> [usize; 4] {
        let (b, h, w, c) = self.data.dim();
        [b, h, w, c]
    }

    pub fn view(&self) -> ndarray::ArrayView4<'_, f32> {
        self.data.view()
    }

    /// Flattened row-major contents.
    pub fn to_vec(&self) -> Vec<f32> {
        self.data.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_channels_are_identical_copies() {
        let features = Array2::from_shape_fn((3, 4), |(b, t)| (b * 10 + t) as f32);
        let tensor = InputTensor::from_feature_map(&features).unwrap();
        assert_eq!(tensor.shape(), [1, 3, 4, 3]);

        let view = tensor.view();
        for b in 0..3 {
            for t in 0..4 {
                for c in 0..3 {
                    assert_eq!(view[[0, b, t, c]], features[[b, t]]);
                }
            }
        }
    }

    #[test]
    fn test_flatten_is_channel_innermost() {
        let features = Array2::from_shape_vec((1, 2), vec![1.0, 2.0]).unwrap();
        let tensor = InputTensor::from_feature_map(&features).unwrap();
        assert_eq!(tensor.to_vec(), vec![1.0, 1.0, 1.0, 2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_degenerate_map_is_shape_error() {
        let features = Array2::<f32>::zeros((128, 0));
        assert!(matches!(
            InputTensor::from_feature_map(&features),
            Err(PipelineError::Shape(_))
        ));
    }

    #[test]
    fn test_zeros_shape() {
        assert_eq!(InputTensor::zeros([1, 128, 862, 3]).shape(), [1, 128, 862, 3]);
    }
}

#![no_main]

use libfuzzer_sys::fuzz_target;
use petcry_neural::decoder::decode_to_rate;
use petcry_neural::{FeatureConfig, FeatureExtractor};

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must decode or fail cleanly, never panic.
    if let Ok(decoded) = decode_to_rate(data, 16000, Some(2)) {
        let extractor = FeatureExtractor::new(FeatureConfig::default());
        let _ = extractor.extract(&decoded.waveform);
    }
});

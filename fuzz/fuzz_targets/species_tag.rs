#![no_main]

use libfuzzer_sys::fuzz_target;
use petcry_core::{LabelMapper, SpeciesPolicy};

fuzz_target!(|data: &[u8]| {
    if let Ok(tag) = std::str::from_utf8(data) {
        let mapper = LabelMapper::default().with_policy(SpeciesPolicy::Strict);
        if let Ok((species, labels)) = mapper.resolve(Some(tag)) {
            assert_eq!(labels.len(), 3);
            let _ = mapper.validate_state(species, tag);
        }
    }
});

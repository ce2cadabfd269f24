#![no_main]

use libfuzzer_sys::fuzz_target;
use mjpeg_extract::{ExtractorConfig, MultipartExtractor};

fuzz_target!(|data: &[u8]| {
    let Some((&split, data)) = data.split_first() else {
        return;
    };

    // small buffers so growth gets exercised too
    let config = ExtractorConfig::default()
        .with_initial_capacity(64)
        .with_growth_step(64);
    let Ok(mut ex) = MultipartExtractor::with_config(config, |_: &[u8]| {}) else {
        return;
    };

    for chunk in data.chunks(split as usize + 1) {
        if ex.process(chunk).is_err() {
            return;
        }
    }
});

#![no_main]

//! Whole-file decode under the fuzzing budgets.
//! Bytes 16..12 from the end pick a libpng-style transform mask, so the
//! same input explores both the parser and the transform paths.

use libfuzzer_sys::fuzz_target;
use strict_png::{decode_png, DecodeConfig, ErrorKind};

fuzz_target!(|data: &[u8]| {
    // Short inputs get every transform, like an all-ones mask.
    let mask = if data.len() >= 24 {
        let at = data.len() - 16;
        i32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]) as u32
    } else {
        u32::MAX
    };

    let config = DecodeConfig::fuzzing().with_libpng_transforms(mask);
    match decode_png(data, &config) {
        Ok(image) => {
            assert_eq!(
                image.pixels.len(),
                image.output.line_size * image.output.height as usize
            );
        }
        Err(err) => assert_ne!(err.kind(), ErrorKind::Internal, "{err}"),
    }
});

#![no_main]

//! Arbitrary budgets against arbitrary input: a successful decode must
//! never exceed the limits it was given.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use strict_png::{decode_png, DecodeConfig, ErrorKind};

#[derive(Arbitrary, Debug)]
struct Input {
    max_pixels: u64,
    max_height: u32,
    max_chunk_bytes: u64,
    max_metadata_bytes: u64,
    quiet_crc: bool,
    width: u32,
    height: u32,
    data: Vec<u8>,
}

fuzz_target!(|input: Input| {
    // Clamp so a valid header cannot ask for a huge buffer.
    let mut config = DecodeConfig::custom();
    config.max_pixel_count = input.max_pixels.min(1 << 20);
    config.max_height = input.max_height.min(1 << 10);
    config.max_chunk_bytes = input.max_chunk_bytes;
    config.max_metadata_bytes = input.max_metadata_bytes;
    config.quiet_crc = input.quiet_crc;

    let pixels_ok = config.enforce_pixels(input.width, input.height).is_ok();
    assert_eq!(
        pixels_ok,
        u64::from(input.width) * u64::from(input.height) <= config.max_pixel_count
    );
    assert_eq!(config.enforce_height(input.height).is_ok(), input.height <= config.max_height);

    match decode_png(&input.data, &config) {
        Ok(image) => {
            assert!(image.header.pixel_count() <= config.max_pixel_count);
            assert!(image.header.height <= config.max_height);
            assert!(image.metadata.stored_bytes() <= config.max_metadata_bytes);
            if !config.quiet_crc {
                assert_eq!(image.crc_mismatches, 0);
            }
        }
        Err(err) => assert_ne!(err.kind(), ErrorKind::Internal, "{err}"),
    }
});

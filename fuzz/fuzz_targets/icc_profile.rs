#![no_main]

//! Fuzz target for iCCP parsing.
//! The input is used as the iCCP payload of an otherwise valid 1x1 image.

use libfuzzer_sys::fuzz_target;
use strict_png::engine::{chunk_crc, ChunkType, PNG_SIGNATURE};
use strict_png::{decode_png, DecodeConfig};

// zlib stream of [0, 0]: one gray row.
const IDAT: [u8; 10] = [0x78, 0x9c, 0x63, 0x60, 0x00, 0x00, 0x00, 0x02, 0x00, 0x01];

fn put(out: &mut Vec<u8>, ty: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(ty);
    out.extend_from_slice(data);
    out.extend_from_slice(&chunk_crc(ChunkType(*ty), data).to_be_bytes());
}

fuzz_target!(|data: &[u8]| {
    let mut png = PNG_SIGNATURE.to_vec();
    put(&mut png, b"IHDR", &[0, 0, 0, 1, 0, 0, 0, 1, 8, 0, 0, 0, 0]);
    put(&mut png, b"iCCP", data);
    put(&mut png, b"IDAT", &IDAT);
    put(&mut png, b"IEND", &[]);

    let config = DecodeConfig::fuzzing();
    let Ok(image) = decode_png(&png, &config) else {
        return;
    };
    if let Ok(Some(profile)) = image.metadata.icc_profile(config.max_metadata_bytes) {
        assert!(profile.data.len() >= 128);
        assert!(profile.data.len() as u64 <= config.max_metadata_bytes);
        assert!(!profile.name.is_empty() && profile.name.chars().count() <= 79);
    }
});

// lib.rs
//
// strict-png: a bounded, fault-isolated streaming PNG decoder
//
// Design goals:
// - Every budget (chunk size, pixels, height, metadata) checked before allocating
// - Every failure is a value; nothing aborts the process
// - Row-at-a-time decoding with explicit, contract-checked transforms
// - Sessions share no mutable state, so batches decode in parallel

pub mod engine;
pub mod error;
pub mod ops;

pub use engine::{
    decode_batch, decode_png, BatchResult, DecodeConfig, DecodePolicy, DecodeSession, DecodeTask,
    DecodedImage, SessionState,
};
pub use error::{ErrorCategory, ErrorKind, Result, StrictPngError};
pub use ops::{TransformFit, TransformSet};

use engine::{BitDepth, ColorType};

/// Header facts available without inflating any image data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectMetadata {
    pub width: u32,
    pub height: u32,
    pub color_type: ColorType,
    pub bit_depth: BitDepth,
    pub interlaced: bool,
    pub has_palette: bool,
    pub has_transparency: bool,
    pub has_icc_profile: bool,
}

/// Inspect a PNG WITHOUT decoding pixels.
///
/// Reads the signature, IHDR and the chunks before the first IDAT under the
/// lenient policy, so it is cheap enough to reject oversized images before
/// committing to a full decode.
pub fn inspect_header_from_bytes(data: &[u8]) -> Result<InspectMetadata> {
    engine::run_with_panic_policy("inspect:png", || {
        let mut session = DecodeSession::new(data, DecodeConfig::lenient())?;
        let header = *session.read_header()?;
        let metadata = session.metadata();
        Ok(InspectMetadata {
            width: header.width,
            height: header.height,
            color_type: header.color_type,
            bit_depth: header.bit_depth,
            interlaced: header.is_interlaced(),
            has_palette: metadata.palette().is_some(),
            has_transparency: metadata.transparency().is_some(),
            has_icc_profile: metadata.find(engine::chunk::iCCP).is_some(),
        })
    })
}

/// Get library version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

// src/engine/api.rs
//
// One-shot decoding: drives a DecodeSession through its whole lifecycle and
// assembles the rows into a single buffer, de-interlacing Adam7 on the way.

use crate::engine::common::run_with_panic_policy;
use crate::engine::firewall::DecodeConfig;
use crate::engine::header::ImageHeader;
use crate::engine::interlace::{self, PassGeometry};
use crate::engine::metadata::Metadata;
use crate::engine::session::{DecodeSession, OutputInfo};
use crate::error::{Result, StrictPngError};
use tracing::debug;

/// A fully decoded image.
#[derive(Clone, Debug)]
pub struct DecodedImage {
    pub header: ImageHeader,
    /// Layout of `pixels`: `output.line_size` bytes per row, `output.height` rows.
    pub output: OutputInfo,
    pub metadata: Metadata,
    /// CRC mismatches tolerated in quiet-CRC mode.
    pub crc_mismatches: u32,
    pub pixels: Vec<u8>,
}

impl DecodedImage {
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        let stride = self.output.line_size;
        let start = (y as usize).checked_mul(stride)?;
        self.pixels.get(start..start.checked_add(stride)?)
    }

    pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
        // Zero-width rows never happen: IHDR rejects width 0.
        self.pixels.chunks_exact(self.output.line_size.max(1))
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }
}

/// Decodes `data` completely.
///
/// Equivalent to `new`, `read_header`, `begin_rows`, `read_row` until `None`
/// and `finalize`, with any panic reported as `InternalPanic`.
pub fn decode_png(data: &[u8], config: &DecodeConfig) -> Result<DecodedImage> {
    run_with_panic_policy("decode:png", || decode_unguarded(data, config))
}

fn allocate_image(output: &OutputInfo) -> Result<Vec<u8>> {
    let total = (output.line_size as u64).saturating_mul(u64::from(output.height));
    let failed = || StrictPngError::allocation_failed("image", total);
    let total = usize::try_from(total).map_err(|_| failed())?;
    let mut pixels = Vec::new();
    pixels.try_reserve_exact(total).map_err(|_| failed())?;
    pixels.resize(total, 0);
    Ok(pixels)
}

fn decode_unguarded(data: &[u8], config: &DecodeConfig) -> Result<DecodedImage> {
    let mut session = DecodeSession::new(data, config.clone())?;
    let header = *session.read_header()?;
    let output = *session.begin_rows()?;

    let mut pixels = allocate_image(&output)?;
    let stride = output.line_size;
    let bits_pp = output.pixel_format().bits_per_pixel() as usize;
    let passes: Vec<PassGeometry> = interlace::passes(header.width, header.height, header.interlace);

    while let Some(row) = session.read_row()? {
        if output.interlaced {
            if let Some(geometry) = passes.iter().find(|p| p.pass == row.pass) {
                interlace::scatter_row(&mut pixels, stride, geometry, row.line, row.data, bits_pp);
            }
        } else {
            let start = row.line as usize * stride;
            if let Some(dst) = pixels.get_mut(start..start + row.data.len()) {
                dst.copy_from_slice(row.data);
            }
        }
    }

    let crc_mismatches = session.crc_mismatches();
    let metadata = session.finalize()?.clone();
    debug!(
        width = output.width,
        height = output.height,
        bytes = pixels.len(),
        crc_mismatches,
        "decoded image"
    );

    Ok(DecodedImage {
        header,
        output,
        metadata,
        crc_mismatches,
        pixels,
    })
}

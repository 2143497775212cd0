// src/engine/header.rs
//
// IHDR decoding and validation.

use crate::engine::chunk::{self, Chunk};
use crate::engine::firewall::DecodeConfig;
use crate::error::{Result, StrictPngError};

/// IHDR payload length.
pub const IHDR_LENGTH: usize = 13;

/// Widths and heights are limited to 2^31 - 1 by the format.
pub const MAX_DIMENSION: u32 = 0x7FFF_FFFF;

/// Describes how a pixel is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ColorType {
    /// 1 grayscale sample.
    Grayscale = 0,
    /// 1 red sample, 1 green sample, 1 blue sample.
    Rgb = 2,
    /// 1 sample for the palette index.
    Indexed = 3,
    /// 1 grayscale sample, then 1 alpha sample.
    GrayscaleAlpha = 4,
    /// 1 red sample, 1 green sample, 1 blue sample, and finally, 1 alpha sample.
    Rgba = 6,
}

impl ColorType {
    pub fn from_u8(n: u8) -> Option<Self> {
        match n {
            0 => Some(Self::Grayscale),
            2 => Some(Self::Rgb),
            3 => Some(Self::Indexed),
            4 => Some(Self::GrayscaleAlpha),
            6 => Some(Self::Rgba),
            _ => None,
        }
    }

    /// Returns the number of samples used per pixel encoded in this way.
    pub fn samples(self) -> usize {
        match self {
            Self::Grayscale | Self::Indexed => 1,
            Self::GrayscaleAlpha => 2,
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }

    pub fn has_alpha(self) -> bool {
        matches!(self, Self::GrayscaleAlpha | Self::Rgba)
    }

    pub fn is_gray(self) -> bool {
        matches!(self, Self::Grayscale | Self::GrayscaleAlpha)
    }

    /// Whether `bit_depth` is one of the legal depths for this color type.
    pub fn is_combination_legal(self, bit_depth: BitDepth) -> bool {
        use BitDepth::*;
        match self {
            Self::Grayscale => true,
            Self::Indexed => bit_depth != Sixteen,
            Self::Rgb | Self::GrayscaleAlpha | Self::Rgba => matches!(bit_depth, Eight | Sixteen),
        }
    }
}

/// Bit depth of each sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum BitDepth {
    One = 1,
    Two = 2,
    Four = 4,
    Eight = 8,
    Sixteen = 16,
}

impl BitDepth {
    pub fn from_u8(n: u8) -> Option<Self> {
        match n {
            1 => Some(Self::One),
            2 => Some(Self::Two),
            4 => Some(Self::Four),
            8 => Some(Self::Eight),
            16 => Some(Self::Sixteen),
            _ => None,
        }
    }

    pub fn bits(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterlaceMethod {
    None,
    Adam7,
}

/// A pixel layout: color type plus sample depth.
///
/// Used both for the stored image and for the output of each transform step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelFormat {
    pub color_type: ColorType,
    pub bit_depth: BitDepth,
}

impl PixelFormat {
    pub fn bits_per_pixel(&self) -> u64 {
        self.color_type.samples() as u64 * u64::from(self.bit_depth.bits())
    }

    /// Bytes per complete pixel for filtering, rounded up to 1.
    pub fn filter_bpp(&self) -> usize {
        ((self.bits_per_pixel() as usize) / 8).max(1)
    }

    /// Bytes needed for a row of `width` pixels, `None` on overflow.
    pub fn row_bytes(&self, width: u32) -> Option<usize> {
        let bits = u64::from(width).checked_mul(self.bits_per_pixel())?;
        usize::try_from(bits.div_ceil(8)).ok()
    }
}

/// Validated IHDR contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHeader {
    pub width: u32,
    pub height: u32,
    pub bit_depth: BitDepth,
    pub color_type: ColorType,
    pub interlace: InterlaceMethod,
    pub compression_method: u8,
    pub filter_method: u8,
}

impl ImageHeader {
    /// Decodes and structurally validates an IHDR chunk. Limits are not
    /// checked here; see [`parse_header`].
    pub fn parse(chunk: &Chunk<'_>) -> Result<Self> {
        if chunk.chunk_type != chunk::IHDR {
            return Err(StrictPngError::invalid_format(format!(
                "expected IHDR as first chunk, found {}",
                chunk.chunk_type
            )));
        }
        let data = chunk.data;
        if data.len() != IHDR_LENGTH {
            return Err(StrictPngError::invalid_format(format!(
                "IHDR length {} (expected {IHDR_LENGTH})",
                data.len()
            )));
        }

        let width = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
        let height = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        if width == 0 || height == 0 {
            return Err(StrictPngError::invalid_format(format!(
                "non-positive image dimension {width}x{height}"
            )));
        }
        if width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(StrictPngError::invalid_format(format!(
                "image dimension {width}x{height} exceeds 2^31-1"
            )));
        }

        let bit_depth = BitDepth::from_u8(data[8]).ok_or_else(|| {
            StrictPngError::invalid_format(format!("invalid bit depth {}", data[8]))
        })?;
        let color_type = ColorType::from_u8(data[9]).ok_or_else(|| {
            StrictPngError::invalid_format(format!("invalid color type {}", data[9]))
        })?;
        if !color_type.is_combination_legal(bit_depth) {
            return Err(StrictPngError::invalid_format(format!(
                "bit depth {} is not allowed for {color_type:?}",
                bit_depth.bits()
            )));
        }

        let compression_method = data[10];
        if compression_method != 0 {
            return Err(StrictPngError::unsupported_method(
                "compression",
                compression_method,
            ));
        }
        let filter_method = data[11];
        if filter_method != 0 {
            return Err(StrictPngError::unsupported_method("filter", filter_method));
        }
        let interlace = match data[12] {
            0 => InterlaceMethod::None,
            1 => InterlaceMethod::Adam7,
            other => return Err(StrictPngError::unsupported_method("interlace", other)),
        };

        Ok(Self {
            width,
            height,
            bit_depth,
            color_type,
            interlace,
            compression_method,
            filter_method,
        })
    }

    pub fn pixel_format(&self) -> PixelFormat {
        PixelFormat {
            color_type: self.color_type,
            bit_depth: self.bit_depth,
        }
    }

    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    pub fn is_interlaced(&self) -> bool {
        self.interlace == InterlaceMethod::Adam7
    }

    /// Bytes in one full-width stored row, excluding the filter byte.
    pub fn row_bytes(&self) -> Option<usize> {
        self.pixel_format().row_bytes(self.width)
    }
}

/// Parses the header and enforces the configured resource limits.
pub fn parse_header(chunk: &Chunk<'_>, config: &DecodeConfig) -> Result<ImageHeader> {
    let header = ImageHeader::parse(chunk)?;
    config.enforce_header(&header)?;
    Ok(header)
}

// src/engine/metadata.rs
//
// Everything outside the pixel stream that a session keeps: palette,
// transparency, raw ancillary chunks and the ICC profile accessor.
// All stored bytes count against DecodeConfig::max_metadata_bytes.

use crate::engine::chunk::{self, Chunk, ChunkType};
use crate::engine::firewall::DecodeConfig;
use crate::engine::header::{ColorType, ImageHeader};
use crate::engine::zlib;
use crate::error::{Result, StrictPngError};
use tracing::{debug, warn};

/// Bytes of the fixed ICC profile header.
pub const ICC_HEADER_LEN: usize = 128;
const MAX_KEYWORD_LEN: usize = 79;

/// tRNS contents, by color type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transparency {
    /// Gray sample value that is fully transparent.
    Gray(u16),
    /// RGB sample values that are fully transparent.
    Rgb(u16, u16, u16),
    /// Alpha per palette entry; missing trailing entries are opaque.
    Indexed(Vec<u8>),
}

/// An ancillary chunk kept verbatim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawChunk {
    pub chunk_type: ChunkType,
    pub data: Vec<u8>,
}

/// An embedded ICC profile after decompression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IccProfile {
    pub name: String,
    pub data: Vec<u8>,
}

#[derive(Clone, Debug, Default)]
pub struct Metadata {
    palette: Option<Vec<[u8; 3]>>,
    transparency: Option<Transparency>,
    chunks: Vec<RawChunk>,
    end_chunks: Vec<RawChunk>,
    stored_bytes: u64,
}

impl Metadata {
    pub fn palette(&self) -> Option<&[[u8; 3]]> {
        self.palette.as_deref()
    }

    pub fn transparency(&self) -> Option<&Transparency> {
        self.transparency.as_ref()
    }

    /// Ancillary chunks seen before the image data.
    pub fn chunks(&self) -> &[RawChunk] {
        &self.chunks
    }

    /// Ancillary chunks seen after the image data.
    pub fn end_chunks(&self) -> &[RawChunk] {
        &self.end_chunks
    }

    /// First stored chunk of `chunk_type`, before or after the image data.
    pub fn find(&self, chunk_type: ChunkType) -> Option<&[u8]> {
        self.chunks
            .iter()
            .chain(&self.end_chunks)
            .find(|c| c.chunk_type == chunk_type)
            .map(|c| c.data.as_slice())
    }

    pub fn stored_bytes(&self) -> u64 {
        self.stored_bytes
    }

    fn charge(&mut self, len: usize, config: &DecodeConfig) -> Result<()> {
        let total = self.stored_bytes.saturating_add(len as u64);
        config.enforce_metadata(total)?;
        self.stored_bytes = total;
        Ok(())
    }

    /// Validates and stores a PLTE payload.
    pub fn set_palette(
        &mut self,
        data: &[u8],
        header: &ImageHeader,
        config: &DecodeConfig,
    ) -> Result<()> {
        if self.palette.is_some() {
            return Err(StrictPngError::invalid_format("duplicate PLTE chunk"));
        }
        if header.color_type.is_gray() {
            return Err(StrictPngError::invalid_format(format!(
                "PLTE not allowed for {:?}",
                header.color_type
            )));
        }
        if data.is_empty() || data.len() % 3 != 0 || data.len() > 256 * 3 {
            return Err(StrictPngError::invalid_format(format!(
                "invalid PLTE length {}",
                data.len()
            )));
        }
        let entries = data.len() / 3;
        if header.color_type == ColorType::Indexed && entries > 1 << header.bit_depth.bits() {
            return Err(StrictPngError::invalid_format(format!(
                "{entries} palette entries exceed bit depth {}",
                header.bit_depth.bits()
            )));
        }
        self.charge(data.len(), config)?;
        self.palette = Some(
            data.chunks_exact(3)
                .map(|rgb| [rgb[0], rgb[1], rgb[2]])
                .collect(),
        );
        debug!(entries, "palette stored");
        Ok(())
    }

    /// Validates and stores a tRNS payload. An invalid chunk is dropped with
    /// a warning; only the budget check can fail.
    pub fn set_transparency(
        &mut self,
        data: &[u8],
        header: &ImageHeader,
        config: &DecodeConfig,
    ) -> Result<bool> {
        let parsed = match Self::parse_transparency(data, header, self.palette()) {
            Ok(_) if self.transparency.is_some() => Err("duplicate tRNS chunk"),
            other => other,
        };
        match parsed {
            Ok(trns) => {
                self.charge(data.len(), config)?;
                self.transparency = Some(trns);
                Ok(true)
            }
            Err(reason) => {
                warn!(color_type = ?header.color_type, len = data.len(), reason, "tRNS dropped");
                Ok(false)
            }
        }
    }

    fn parse_transparency(
        data: &[u8],
        header: &ImageHeader,
        palette: Option<&[[u8; 3]]>,
    ) -> std::result::Result<Transparency, &'static str> {
        let sample = |i: usize| u16::from_be_bytes([data[2 * i], data[2 * i + 1]]);
        match header.color_type {
            ColorType::Grayscale if data.len() == 2 => Ok(Transparency::Gray(sample(0))),
            ColorType::Rgb if data.len() == 6 => {
                Ok(Transparency::Rgb(sample(0), sample(1), sample(2)))
            }
            ColorType::Grayscale | ColorType::Rgb => Err("wrong tRNS length"),
            ColorType::Indexed => {
                let palette = palette.ok_or("tRNS before PLTE")?;
                if data.is_empty() || data.len() > palette.len() {
                    Err("tRNS longer than palette")
                } else {
                    Ok(Transparency::Indexed(data.to_vec()))
                }
            }
            ColorType::GrayscaleAlpha | ColorType::Rgba => Err("tRNS with alpha channel"),
        }
    }

    /// Stores an ancillary chunk seen before the image data.
    pub fn store_chunk(&mut self, chunk: &Chunk<'_>, config: &DecodeConfig) -> Result<()> {
        self.charge(chunk.data.len(), config)?;
        self.chunks.push(RawChunk {
            chunk_type: chunk.chunk_type,
            data: chunk.data.to_vec(),
        });
        Ok(())
    }

    /// Stores an ancillary chunk seen after the image data.
    pub fn store_end_chunk(&mut self, chunk: &Chunk<'_>, config: &DecodeConfig) -> Result<()> {
        self.charge(chunk.data.len(), config)?;
        self.end_chunks.push(RawChunk {
            chunk_type: chunk.chunk_type,
            data: chunk.data.to_vec(),
        });
        Ok(())
    }

    /// Decompresses the iCCP chunk, if there is one.
    ///
    /// The inflated stream is capped at `max_bytes`. The profile's own size
    /// field must fit the cap and the inflated data; anything past it is
    /// trimmed.
    pub fn icc_profile(&self, max_bytes: u64) -> Result<Option<IccProfile>> {
        let Some(data) = self.find(chunk::iCCP) else {
            return Ok(None);
        };
        parse_iccp(data, max_bytes).map(Some)
    }
}

fn parse_iccp(data: &[u8], max_bytes: u64) -> Result<IccProfile> {
    let nul = data
        .iter()
        .take(MAX_KEYWORD_LEN + 1)
        .position(|&b| b == 0)
        .ok_or_else(|| StrictPngError::invalid_format("iCCP keyword missing or too long"))?;
    if nul == 0 {
        return Err(StrictPngError::invalid_format("empty iCCP keyword"));
    }
    // Latin-1, so every byte maps to one char.
    let name: String = data[..nul].iter().map(|&b| char::from(b)).collect();

    let method = *data
        .get(nul + 1)
        .ok_or_else(|| StrictPngError::truncated(1, 0))?;
    if method != 0 {
        return Err(StrictPngError::unsupported_method("iCCP compression", method));
    }

    let inflated = zlib::inflate_bounded(&data[nul + 2..], max_bytes)?;
    let mut profile = inflated.data;
    if profile.len() < ICC_HEADER_LEN {
        return Err(StrictPngError::truncated(ICC_HEADER_LEN, profile.len()));
    }

    let declared = u32::from_be_bytes([profile[0], profile[1], profile[2], profile[3]]);
    if u64::from(declared) > max_bytes {
        return Err(StrictPngError::metadata_exceeds_limit(
            u64::from(declared),
            max_bytes,
        ));
    }
    let declared = declared as usize;
    if declared < ICC_HEADER_LEN {
        return Err(StrictPngError::invalid_format(format!(
            "ICC profile declares {declared} bytes, shorter than its header"
        )));
    }
    if declared > profile.len() {
        return Err(StrictPngError::truncated(declared, profile.len()));
    }
    if !inflated.complete {
        return Err(StrictPngError::truncated(declared, profile.len()));
    }
    if profile.len() > declared {
        warn!(
            profile = %name,
            declared,
            inflated = profile.len(),
            "trailing data after ICC profile trimmed"
        );
        profile.truncate(declared);
    }

    Ok(IccProfile {
        name,
        data: profile,
    })
}

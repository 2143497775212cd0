// src/engine/chunk.rs
//
// Chunk framing: length, type tag, payload, CRC-32.

#![allow(non_upper_case_globals)]

use crate::engine::cursor::ByteCursor;
use crate::engine::firewall::DecodeConfig;
use crate::error::{Result, StrictPngError};
use flate2::Crc;
use std::fmt;
use tracing::{trace, warn};

/// Largest chunk length the PNG format allows (2^31 - 1).
pub const MAX_CHUNK_LENGTH: u32 = 0x7FFF_FFFF;

/// Length + type + CRC around every payload.
pub const CHUNK_OVERHEAD: usize = 12;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkType(pub [u8; 4]);

// -- Critical chunks --

/// Image header
pub const IHDR: ChunkType = ChunkType(*b"IHDR");
/// Palette
pub const PLTE: ChunkType = ChunkType(*b"PLTE");
/// Image data
pub const IDAT: ChunkType = ChunkType(*b"IDAT");
/// Image trailer
pub const IEND: ChunkType = ChunkType(*b"IEND");

// -- Ancillary chunks --

/// Transparency
pub const tRNS: ChunkType = ChunkType(*b"tRNS");
/// Source system's gamma value
pub const gAMA: ChunkType = ChunkType(*b"gAMA");
/// Source system's pixel chromaticities
pub const cHRM: ChunkType = ChunkType(*b"cHRM");
/// sRGB color space chunk
pub const sRGB: ChunkType = ChunkType(*b"sRGB");
/// ICC profile chunk
pub const iCCP: ChunkType = ChunkType(*b"iCCP");
/// Significant bits
pub const sBIT: ChunkType = ChunkType(*b"sBIT");
/// Background colour
pub const bKGD: ChunkType = ChunkType(*b"bKGD");
/// Physical pixel dimensions
pub const pHYs: ChunkType = ChunkType(*b"pHYs");
/// Image last-modification time
pub const tIME: ChunkType = ChunkType(*b"tIME");
/// Latin-1 uncompressed textual data
pub const tEXt: ChunkType = ChunkType(*b"tEXt");
/// Latin-1 compressed textual data
pub const zTXt: ChunkType = ChunkType(*b"zTXt");
/// UTF-8 textual data
pub const iTXt: ChunkType = ChunkType(*b"iTXt");

impl ChunkType {
    /// Critical chunks have an uppercase first letter.
    pub fn is_critical(self) -> bool {
        self.0[0] & 32 == 0
    }

    pub fn is_private(self) -> bool {
        self.0[1] & 32 != 0
    }

    /// A set reserved bit makes the chunk name invalid.
    pub fn reserved_set(self) -> bool {
        self.0[2] & 32 != 0
    }

    pub fn is_safe_to_copy(self) -> bool {
        self.0[3] & 32 != 0
    }

    fn is_well_formed(self) -> bool {
        self.0.iter().all(u8::is_ascii_alphabetic)
    }
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &c in &self.0 {
            write!(f, "{}", char::from(c).escape_debug())?;
        }
        Ok(())
    }
}

impl fmt::Debug for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkType")
            .field("type", &format_args!("{self}"))
            .field("critical", &self.is_critical())
            .field("private", &self.is_private())
            .field("reserved", &self.reserved_set())
            .field("safecopy", &self.is_safe_to_copy())
            .finish()
    }
}

/// One framed chunk. The payload borrows from the input buffer.
#[derive(Clone, Copy, Debug)]
pub struct Chunk<'a> {
    pub chunk_type: ChunkType,
    pub data: &'a [u8],
    pub crc: u32,
    /// False only when a mismatch was tolerated in quiet-CRC mode.
    pub crc_ok: bool,
}

impl Chunk<'_> {
    pub fn length(&self) -> u32 {
        // Bounded by MAX_CHUNK_LENGTH when parsed.
        self.data.len() as u32
    }
}

/// CRC-32 over type + payload, as stored after each chunk.
pub fn chunk_crc(chunk_type: ChunkType, data: &[u8]) -> u32 {
    let mut crc = Crc::new();
    crc.update(&chunk_type.0);
    crc.update(data);
    crc.sum()
}

/// Splits a byte stream into chunks, enforcing the chunk size cap and CRC policy.
#[derive(Clone, Debug)]
pub struct ChunkParser {
    max_chunk_bytes: u64,
    quiet_crc: bool,
    crc_mismatches: u32,
}

impl ChunkParser {
    pub fn new(max_chunk_bytes: u64, quiet_crc: bool) -> Self {
        Self {
            max_chunk_bytes,
            quiet_crc,
            crc_mismatches: 0,
        }
    }

    pub fn from_config(config: &DecodeConfig) -> Self {
        Self::new(config.max_chunk_bytes, config.quiet_crc)
    }

    /// CRC mismatches tolerated so far (always 0 unless quiet-CRC is on).
    pub fn crc_mismatches(&self) -> u32 {
        self.crc_mismatches
    }

    /// Reads the next chunk. `Ok(None)` means the cursor was already empty.
    pub fn next_chunk<'a>(&mut self, cursor: &mut ByteCursor<'a>) -> Result<Option<Chunk<'a>>> {
        if cursor.is_empty() {
            return Ok(None);
        }

        let length = cursor.read_u32_be()?;
        let chunk_type = ChunkType(cursor.read_array()?);
        if !chunk_type.is_well_formed() {
            return Err(StrictPngError::invalid_format(format!(
                "chunk type {chunk_type} contains non-letter bytes"
            )));
        }
        if length > MAX_CHUNK_LENGTH || u64::from(length) > self.max_chunk_bytes {
            return Err(StrictPngError::chunk_too_large(
                chunk_type,
                length,
                self.max_chunk_bytes.min(u64::from(MAX_CHUNK_LENGTH)),
            ));
        }

        let data = cursor.read(length as usize)?;
        let crc = cursor.read_u32_be()?;
        let computed = chunk_crc(chunk_type, data);
        let crc_ok = computed == crc;
        if !crc_ok {
            if !self.quiet_crc {
                return Err(StrictPngError::checksum_mismatch(chunk_type, crc, computed));
            }
            self.crc_mismatches += 1;
            warn!(
                chunk = %chunk_type,
                stored = crc,
                computed,
                "CRC mismatch tolerated in quiet-CRC mode"
            );
        }

        trace!(chunk = %chunk_type, length, "chunk");
        Ok(Some(Chunk {
            chunk_type,
            data,
            crc,
            crc_ok,
        }))
    }
}

// tests/common/mod.rs
//
// Shared helpers: a small PNG writer that can produce both valid and
// deliberately broken streams.

#![allow(dead_code)]

use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::Write;
use strict_png::engine::{chunk_crc, ChunkType, PNG_SIGNATURE};

pub fn zlib(data: &[u8]) -> Vec<u8> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

pub fn put_chunk(out: &mut Vec<u8>, ty: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(ty);
    out.extend_from_slice(data);
    out.extend_from_slice(&chunk_crc(ChunkType(*ty), data).to_be_bytes());
}

pub fn ihdr(width: u32, height: u32, depth: u8, color: u8, interlace: u8) -> Vec<u8> {
    let mut d = Vec::with_capacity(13);
    d.extend_from_slice(&width.to_be_bytes());
    d.extend_from_slice(&height.to_be_bytes());
    d.extend_from_slice(&[depth, color, 0, 0, interlace]);
    d
}

/// Builds a PNG from raw (already filtered) scanline bytes.
#[derive(Clone, Debug)]
pub struct PngBuilder {
    ihdr: Vec<u8>,
    before: Vec<([u8; 4], Vec<u8>)>,
    after: Vec<([u8; 4], Vec<u8>)>,
    raw: Vec<u8>,
    idat_override: Option<Vec<u8>>,
    idat_parts: usize,
    with_end: bool,
}

impl PngBuilder {
    pub fn new(width: u32, height: u32, depth: u8, color: u8) -> Self {
        Self {
            ihdr: ihdr(width, height, depth, color, 0),
            before: Vec::new(),
            after: Vec::new(),
            raw: Vec::new(),
            idat_override: None,
            idat_parts: 1,
            with_end: true,
        }
    }

    pub fn interlaced(mut self) -> Self {
        self.ihdr[12] = 1;
        self
    }

    pub fn ihdr_bytes(mut self, ihdr: Vec<u8>) -> Self {
        self.ihdr = ihdr;
        self
    }

    /// Filtered scanlines, filter byte included.
    pub fn raw(mut self, raw: &[u8]) -> Self {
        self.raw = raw.to_vec();
        self
    }

    /// Compressed IDAT payload used verbatim instead of compressing `raw`.
    pub fn idat(mut self, compressed: Vec<u8>) -> Self {
        self.idat_override = Some(compressed);
        self
    }

    pub fn split_idat(mut self, parts: usize) -> Self {
        self.idat_parts = parts.max(1);
        self
    }

    pub fn before_idat(mut self, ty: &[u8; 4], data: &[u8]) -> Self {
        self.before.push((*ty, data.to_vec()));
        self
    }

    pub fn after_idat(mut self, ty: &[u8; 4], data: &[u8]) -> Self {
        self.after.push((*ty, data.to_vec()));
        self
    }

    pub fn without_end(mut self) -> Self {
        self.with_end = false;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = PNG_SIGNATURE.to_vec();
        put_chunk(&mut out, b"IHDR", &self.ihdr);
        for (ty, data) in &self.before {
            put_chunk(&mut out, ty, data);
        }
        let idat = self
            .idat_override
            .clone()
            .unwrap_or_else(|| zlib(&self.raw));
        let part = idat.len().div_ceil(self.idat_parts).max(1);
        for piece in idat.chunks(part) {
            put_chunk(&mut out, b"IDAT", piece);
        }
        for (ty, data) in &self.after {
            put_chunk(&mut out, ty, data);
        }
        if self.with_end {
            put_chunk(&mut out, b"IEND", &[]);
        }
        out
    }
}

/// Prefixes every row of `pixels` (packed, `stride` bytes per row) with
/// filter type 0.
pub fn unfiltered(pixels: &[u8], stride: usize) -> Vec<u8> {
    let mut raw = Vec::with_capacity(pixels.len() + pixels.len() / stride.max(1));
    for row in pixels.chunks(stride) {
        raw.push(0);
        raw.extend_from_slice(row);
    }
    raw
}

fn get_bits(row: &[u8], index: usize, bits: usize) -> u64 {
    if bits >= 8 {
        let bytes = bits / 8;
        row[index * bytes..(index + 1) * bytes]
            .iter()
            .fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
    } else {
        let bit = index * bits;
        let shift = 8 - bit % 8 - bits;
        u64::from((row[bit / 8] >> shift) & ((1u8 << bits) - 1))
    }
}

fn put_bits(row: &mut [u8], index: usize, bits: usize, value: u64) {
    if bits >= 8 {
        let bytes = bits / 8;
        for i in 0..bytes {
            row[index * bytes + i] = (value >> (8 * (bytes - 1 - i))) as u8;
        }
    } else {
        let bit = index * bits;
        let shift = 8 - bit % 8 - bits;
        row[bit / 8] |= (value as u8) << shift;
    }
}

/// Re-lays packed pixels as Adam7 pass scanlines (filter type 0).
pub fn adam7_raw(pixels: &[u8], width: u32, height: u32, bits_pp: usize) -> Vec<u8> {
    const X0: [u32; 7] = [0, 4, 0, 2, 0, 1, 0];
    const Y0: [u32; 7] = [0, 0, 4, 0, 2, 0, 1];
    const DX: [u32; 7] = [8, 8, 4, 4, 2, 2, 1];
    const DY: [u32; 7] = [8, 8, 8, 4, 4, 2, 2];
    let stride = (width as usize * bits_pp).div_ceil(8);

    let mut raw = Vec::new();
    for p in 0..7 {
        if X0[p] >= width || Y0[p] >= height {
            continue;
        }
        let pw = (width - X0[p]).div_ceil(DX[p]) as usize;
        let row_len = (pw * bits_pp).div_ceil(8);
        let mut y = Y0[p];
        while y < height {
            let src = &pixels[y as usize * stride..(y as usize + 1) * stride];
            let mut row = vec![0u8; row_len];
            for i in 0..pw {
                let x = X0[p] as usize + i * DX[p] as usize;
                put_bits(&mut row, i, bits_pp, get_bits(src, x, bits_pp));
            }
            raw.push(0);
            raw.extend_from_slice(&row);
            y += DY[p];
        }
    }
    raw
}

/// Minimal ICC profile: a 128-byte header plus an empty tag table, padded
/// to `len` bytes and declaring `declared` bytes in its size field.
pub fn icc_profile(declared: u32, len: usize) -> Vec<u8> {
    let mut p = vec![0u8; len.max(4)];
    p[..4].copy_from_slice(&declared.to_be_bytes());
    if len >= 40 {
        p[36..40].copy_from_slice(b"acsp");
    }
    p.truncate(len);
    p
}

/// iCCP chunk payload: keyword, NUL, compression method, zlib data.
pub fn iccp_payload(name: &[u8], method: u8, compressed: &[u8]) -> Vec<u8> {
    let mut d = name.to_vec();
    d.push(0);
    d.push(method);
    d.extend_from_slice(compressed);
    d
}

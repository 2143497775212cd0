// src/engine/cursor.rs
//
// Bounds-checked forward-only reader over the caller's input buffer.

use crate::error::{Result, StrictPngError};

/// Forward-only reader over a borrowed byte slice.
///
/// Reads hand out sub-slices of the original buffer; nothing is copied and
/// the only state is the current offset.
#[derive(Clone, Debug)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Returns exactly `n` bytes or fails with `Truncated`.
    ///
    /// The offset only advances on success.
    pub fn read(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| StrictPngError::truncated(n, self.remaining()))?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16_be(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    pub fn read_u32_be(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.read(n).map(|_| ())
    }

    /// Everything not yet consumed, without advancing.
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }
}

// src/engine/scanline.rs
//
// The reusable pair of rows the filter reconstructor works on.

use crate::engine::filter;
use crate::error::{Result, StrictPngError};

/// Current and previous scanline, each `1 + row_bytes` long for the widest pass.
///
/// Byte 0 of `current` is the filter byte as read from the stream; the
/// reconstructed pixels follow it. `previous` keeps the same layout so the two
/// can be swapped without copying.
#[derive(Debug)]
pub struct ScanlineBuffer {
    current: Vec<u8>,
    previous: Vec<u8>,
    /// Bytes of the active pass's rows, without the filter byte.
    row_len: usize,
}

impl ScanlineBuffer {
    /// Allocates both rows for `max_row_bytes` pixel bytes. An allocation
    /// the allocator refuses is an `ExceedsLimits` error, not an abort.
    pub fn new(max_row_bytes: usize) -> Result<Self> {
        let failed = || StrictPngError::allocation_failed("scanline", max_row_bytes as u64);
        let len = max_row_bytes.checked_add(1).ok_or_else(failed)?;
        Ok(Self {
            current: zeroed(len).ok_or_else(failed)?,
            previous: zeroed(len).ok_or_else(failed)?,
            row_len: max_row_bytes,
        })
    }

    /// Start a pass whose rows are `row_bytes` long: the row above the first
    /// row is all zeroes.
    pub fn reset(&mut self, row_bytes: usize) -> Result<()> {
        if row_bytes + 1 > self.current.len() {
            return Err(StrictPngError::internal_panic(
                "pass row wider than scanline buffer",
            ));
        }
        self.row_len = row_bytes;
        self.previous.fill(0);
        Ok(())
    }

    pub fn row_len(&self) -> usize {
        self.row_len
    }

    /// Slot the inflater fills: filter byte plus the raw filtered row.
    pub fn raw_mut(&mut self) -> &mut [u8] {
        &mut self.current[..=self.row_len]
    }

    /// Reverses the filter of the row currently in `raw_mut`.
    pub fn unfilter_current(&mut self, bpp: usize, line: u32) -> Result<()> {
        let len = self.row_len + 1;
        let filter_byte = self.current[0];
        filter::reconstruct(
            filter_byte,
            &mut self.current[1..len],
            &self.previous[1..len],
            bpp,
            line,
        )
    }

    /// Reconstructed pixels of the current row.
    pub fn current(&self) -> &[u8] {
        &self.current[1..=self.row_len]
    }

    /// Makes the current row the next row's `previous`.
    pub fn advance(&mut self) {
        std::mem::swap(&mut self.current, &mut self.previous);
    }
}

fn zeroed(len: usize) -> Option<Vec<u8>> {
    let mut row = Vec::new();
    row.try_reserve_exact(len).ok()?;
    row.resize(len, 0);
    Some(row)
}

// src/engine/filter.rs
//
// Reversal of the five per-scanline prediction filters.

use crate::error::{Result, StrictPngError};

/// The byte in front of every scanline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FilterType {
    NoFilter = 0,
    Sub = 1,
    Up = 2,
    Avg = 3,
    Paeth = 4,
}

impl FilterType {
    /// u8 -> Self. Unknown values are not mapped to anything.
    pub fn from_u8(n: u8) -> Option<Self> {
        match n {
            0 => Some(Self::NoFilter),
            1 => Some(Self::Sub),
            2 => Some(Self::Up),
            3 => Some(Self::Avg),
            4 => Some(Self::Paeth),
            _ => None,
        }
    }
}

/// Paeth predictor; ties go to `a` (left), then `b` (up), then `c` (upper-left).
pub(crate) fn paeth_predictor(a: u8, b: u8, c: u8) -> u8 {
    let pa = (i16::from(b) - i16::from(c)).abs();
    let pb = (i16::from(a) - i16::from(c)).abs();
    let pc = ((i16::from(a) - i16::from(c)) + (i16::from(b) - i16::from(c))).abs();

    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

/// Reverses `filter` on `current` in place.
///
/// `previous` is the reconstructed row above (all zeroes for the first row of
/// a pass) and must be at least as long as `current`. `bpp` is the filter
/// stride: bytes per complete pixel, at least 1.
///
/// # Panics
///
/// If `previous` is shorter than `current`. [`reconstruct`] checks this and
/// returns an error instead.
pub fn unfilter(filter: FilterType, bpp: usize, previous: &[u8], current: &mut [u8]) {
    debug_assert!(bpp >= 1);
    let len = current.len();
    let previous = &previous[..len];
    let lead = bpp.min(len);

    match filter {
        FilterType::NoFilter => {}
        FilterType::Sub => {
            for i in bpp..len {
                current[i] = current[i].wrapping_add(current[i - bpp]);
            }
        }
        FilterType::Up => {
            for (curr, &above) in current.iter_mut().zip(previous) {
                *curr = curr.wrapping_add(above);
            }
        }
        FilterType::Avg => {
            for i in 0..lead {
                current[i] = current[i].wrapping_add(previous[i] / 2);
            }
            for i in bpp..len {
                let avg = (u16::from(current[i - bpp]) + u16::from(previous[i])) / 2;
                current[i] = current[i].wrapping_add(avg as u8);
            }
        }
        FilterType::Paeth => {
            // No left neighbour: the predictor degenerates to `up`.
            for i in 0..lead {
                current[i] = current[i].wrapping_add(previous[i]);
            }
            for i in bpp..len {
                let pred = paeth_predictor(current[i - bpp], previous[i], previous[i - bpp]);
                current[i] = current[i].wrapping_add(pred);
            }
        }
    }
}

/// Validates the filter byte and reverses it; `line` is only used for the error.
pub fn reconstruct(
    filter_byte: u8,
    current: &mut [u8],
    previous: &[u8],
    bpp: usize,
    line: u32,
) -> Result<()> {
    let filter =
        FilterType::from_u8(filter_byte).ok_or_else(|| StrictPngError::invalid_filter(filter_byte, line))?;
    if previous.len() < current.len() {
        return Err(StrictPngError::internal_panic(
            "previous scanline shorter than current",
        ));
    }
    unfilter(filter, bpp.max(1), previous, current);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    // Forward filter, only needed to build test vectors.
    fn filter_row(filter: FilterType, bpp: usize, previous: &[u8], raw: &[u8]) -> Vec<u8> {
        let left = |i: usize| if i >= bpp { raw[i - bpp] } else { 0 };
        let upper_left = |i: usize| if i >= bpp { previous[i - bpp] } else { 0 };
        (0..raw.len())
            .map(|i| {
                let pred = match filter {
                    FilterType::NoFilter => 0,
                    FilterType::Sub => left(i),
                    FilterType::Up => previous[i],
                    FilterType::Avg => ((u16::from(left(i)) + u16::from(previous[i])) / 2) as u8,
                    FilterType::Paeth => paeth_predictor(left(i), previous[i], upper_left(i)),
                };
                raw[i].wrapping_sub(pred)
            })
            .collect()
    }

    const ALL: [FilterType; 5] = [
        FilterType::NoFilter,
        FilterType::Sub,
        FilterType::Up,
        FilterType::Avg,
        FilterType::Paeth,
    ];

    #[test]
    fn roundtrip_every_filter_and_stride() {
        let previous: Vec<u8> = (0..48u32).map(|i| (i * 37 % 251) as u8).collect();
        let raw: Vec<u8> = (0..48u32).map(|i| (i * 91 % 253) as u8 ^ 0x5A).collect();
        for bpp in [1usize, 2, 3, 4, 6, 8] {
            for filter in ALL {
                let mut row = filter_row(filter, bpp, &previous, &raw);
                unfilter(filter, bpp, &previous, &mut row);
                assert_eq!(row, raw, "{filter:?} bpp={bpp}");
            }
        }
    }

    #[test]
    fn first_row_uses_zero_previous() {
        let zeros = [0u8; 6];
        let raw = [10u8, 20, 30, 40, 50, 60];
        for filter in ALL {
            let mut row = filter_row(filter, 3, &zeros, &raw);
            reconstruct(filter as u8, &mut row, &zeros, 3, 0).unwrap();
            assert_eq!(row, raw, "{filter:?}");
        }
    }

    #[test]
    fn paeth_tie_prefers_left() {
        // a == b == c: all three gradients are 0.
        assert_eq!(paeth_predictor(7, 7, 7), 7);
        // p = a + b - c = 10 + 20 - 10 = 20; pa = 10, pb = 0 -> up.
        assert_eq!(paeth_predictor(10, 20, 10), 20);
        // pa == pb == 10, pc == 20 -> left wins the tie.
        assert_eq!(paeth_predictor(20, 20, 10), 20);
        // Distinct a and b with pa == pb: a = 30, b = 10, c = 20 -> p = 20,
        // pa = 10, pb = 10, pc = 0 -> upper-left is strictly best.
        assert_eq!(paeth_predictor(30, 10, 20), 20);
        // a = 10, b = 30, c = 0: p = 40, pa = 30, pb = 10, pc = 40 -> up.
        assert_eq!(paeth_predictor(10, 30, 0), 30);
        // a = 15, b = 5, c = 0: p = 20, pa = 5, pb = 15, pc = 20 -> left.
        assert_eq!(paeth_predictor(15, 5, 0), 15);
        // pb == pc, pa larger: a = 0, b = 10, c = 5 -> p = 5, pa = 5, pb = 5,
        // pc = 0 -> upper-left. a = 10, b = 0, c = 10 -> pa = 10, pb = 0,
        // pc = 10 -> up beats upper-left on the tie.
        assert_eq!(paeth_predictor(10, 0, 10), 0);
    }

    #[test]
    fn paeth_tie_in_a_synthetic_row() {
        // bpp 1; previous row is flat, so for every pixel after the first
        // left/up/upper-left gradients tie whenever left == up.
        let previous = [100u8, 100, 100, 100];
        let mut row = [0u8, 0, 0, 0];
        unfilter(FilterType::Paeth, 1, &previous, &mut row);
        // first byte: predictor is up (100); later bytes: a = 100, b = 100,
        // c = 100, all gradients 0 -> left.
        assert_eq!(row, [100, 100, 100, 100]);

        // left = 50, up = 50, upper-left = 0: pa = 50, pb = 50, pc = 100 -> left.
        let previous = [0u8, 50];
        let mut row = [50u8, 1];
        unfilter(FilterType::Paeth, 1, &previous, &mut row);
        assert_eq!(row, [50, 51]);
    }

    #[test]
    fn unknown_filter_byte_is_rejected() {
        let mut row = [1u8, 2, 3];
        let err = reconstruct(5, &mut row, &[0; 3], 1, 7).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFilter);
        assert!(matches!(
            err,
            StrictPngError::InvalidFilter { filter: 5, line: 7 }
        ));
        // row untouched
        assert_eq!(row, [1, 2, 3]);
    }

    #[test]
    fn stride_longer_than_row() {
        // 16-bit RGBA (bpp 8) on a row shorter than one pixel never happens in
        // practice, but must not index out of bounds.
        let mut row = [1u8, 2, 3];
        unfilter(FilterType::Avg, 8, &[4, 4, 4], &mut row);
        assert_eq!(row, [3, 4, 5]);
        let mut row = [1u8, 2, 3];
        unfilter(FilterType::Paeth, 8, &[4, 4, 4], &mut row);
        assert_eq!(row, [5, 6, 7]);
    }
}

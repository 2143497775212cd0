// src/engine/interlace.rs
//
// Adam7 pass geometry, row enumeration, and scattering pass rows into a
// full-size image.
//
// Each 8x8 tile is covered by the seven passes like this:
//
//     1 6 4 6 2 6 4 6
//     7 7 7 7 7 7 7 7
//     5 6 5 6 5 6 5 6
//     7 7 7 7 7 7 7 7
//     3 6 4 6 3 6 4 6
//     7 7 7 7 7 7 7 7
//     5 6 5 6 5 6 5 6
//     7 7 7 7 7 7 7 7

use crate::engine::header::InterlaceMethod;

const X_START: [u32; 7] = [0, 4, 0, 2, 0, 1, 0];
const Y_START: [u32; 7] = [0, 0, 4, 0, 2, 0, 1];
const X_STEP: [u32; 7] = [8, 8, 4, 4, 2, 2, 1];
const Y_STEP: [u32; 7] = [8, 8, 8, 4, 4, 2, 2];

/// Number of passes the interlace method defines.
pub fn pass_count(interlace: InterlaceMethod) -> usize {
    match interlace {
        InterlaceMethod::None => 1,
        InterlaceMethod::Adam7 => 7,
    }
}

/// Where one pass's pixels live in the full image.
///
/// `pass` is 0 for a non-interlaced image and 1..=7 for Adam7.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PassGeometry {
    pub pass: u8,
    pub x_start: u32,
    pub y_start: u32,
    pub x_step: u32,
    pub y_step: u32,
    /// Pixels per row of this pass.
    pub width: u32,
    /// Rows in this pass.
    pub height: u32,
}

impl PassGeometry {
    fn full(width: u32, height: u32) -> Self {
        Self {
            pass: 0,
            x_start: 0,
            y_start: 0,
            x_step: 1,
            y_step: 1,
            width,
            height,
        }
    }

    fn adam7(index: usize, width: u32, height: u32) -> Self {
        let extent = |size: u32, start: u32, step: u32| {
            if size > start {
                (size - start).div_ceil(step)
            } else {
                0
            }
        };
        Self {
            pass: index as u8 + 1,
            x_start: X_START[index],
            y_start: Y_START[index],
            x_step: X_STEP[index],
            y_step: Y_STEP[index],
            width: extent(width, X_START[index], X_STEP[index]),
            height: extent(height, Y_START[index], Y_STEP[index]),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Every pass that carries data, in stream order. Empty Adam7 passes (small
/// images) are left out since they contribute no bytes to the stream.
pub fn passes(width: u32, height: u32, interlace: InterlaceMethod) -> Vec<PassGeometry> {
    match interlace {
        InterlaceMethod::None => vec![PassGeometry::full(width, height)],
        InterlaceMethod::Adam7 => (0..7)
            .map(|i| PassGeometry::adam7(i, width, height))
            .filter(|p| !p.is_empty())
            .collect(),
    }
}

/// Identifies one stored row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RowInfo {
    pub pass: u8,
    /// Row index within the pass.
    pub line: u32,
    /// Pixels in the row.
    pub width: u32,
}

/// Walks `(pass, line)` over every stored row in stream order.
#[derive(Clone, Debug)]
pub struct RowIter {
    passes: Vec<PassGeometry>,
    pass_index: usize,
    line: u32,
}

impl RowIter {
    pub fn new(width: u32, height: u32, interlace: InterlaceMethod) -> Self {
        Self {
            passes: passes(width, height, interlace),
            pass_index: 0,
            line: 0,
        }
    }

    /// Geometry of the pass the next row belongs to.
    pub fn current_pass(&self) -> Option<&PassGeometry> {
        self.passes.get(self.pass_index)
    }

    /// Rows not yet yielded.
    pub fn remaining(&self) -> u64 {
        self.passes
            .iter()
            .skip(self.pass_index)
            .map(|p| u64::from(p.height))
            .sum::<u64>()
            - u64::from(self.line)
    }

    pub fn total_rows(&self) -> u64 {
        self.passes.iter().map(|p| u64::from(p.height)).sum()
    }
}

impl Iterator for RowIter {
    type Item = RowInfo;

    fn next(&mut self) -> Option<RowInfo> {
        let pass = *self.passes.get(self.pass_index)?;
        let info = RowInfo {
            pass: pass.pass,
            line: self.line,
            width: pass.width,
        };
        self.line += 1;
        if self.line == pass.height {
            self.pass_index += 1;
            self.line = 0;
        }
        Some(info)
    }
}

/// Copies a pass row into its place in a full image whose rows are
/// `image_stride` bytes, with `bits_pp` bits per output pixel.
///
/// Sub-byte pixels are placed at the bit level, most significant bits first.
/// Rows or pixels that fall outside `image` are ignored.
pub fn scatter_row(
    image: &mut [u8],
    image_stride: usize,
    geometry: &PassGeometry,
    line: u32,
    row: &[u8],
    bits_pp: usize,
) {
    let y = geometry.y_start as usize + line as usize * geometry.y_step as usize;
    let Some(dst_row) = image.get_mut(y * image_stride..).map(|rest| {
        let n = image_stride.min(rest.len());
        &mut rest[..n]
    }) else {
        return;
    };

    let xs = (0..geometry.width as usize)
        .map(|i| geometry.x_start as usize + i * geometry.x_step as usize);

    if bits_pp < 8 {
        let mask = (1u8 << bits_pp) - 1;
        for (i, x) in xs.enumerate() {
            let src_bit = i * bits_pp;
            let Some(&src) = row.get(src_bit / 8) else {
                break;
            };
            let px = (src >> (8 - src_bit % 8 - bits_pp)) & mask;

            let dst_bit = x * bits_pp;
            let shift = 8 - dst_bit % 8 - bits_pp;
            if let Some(dst) = dst_row.get_mut(dst_bit / 8) {
                *dst = (*dst & !(mask << shift)) | (px << shift);
            }
        }
    } else {
        let bytes_pp = bits_pp / 8;
        for (x, px) in xs.zip(row.chunks_exact(bytes_pp)) {
            let start = x * bytes_pp;
            if let Some(dst) = dst_row.get_mut(start..start + bytes_pp) {
                dst.copy_from_slice(px);
            }
        }
    }
}

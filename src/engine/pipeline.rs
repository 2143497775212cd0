// src/engine/pipeline.rs
//
// Transform planning and execution.
// Planning walks the requested transforms in their fixed order while tracking
// the pixel format each step produces, so a transform whose contract is not
// met fails before the first row is decoded.

use crate::engine::header::{BitDepth, ColorType, ImageHeader, PixelFormat};
use crate::engine::metadata::{Metadata, Transparency};
use crate::error::{Result, StrictPngError};
use crate::ops::{Transform, TransformContract, TransformFit, TransformRequirement, TransformSet};
use tracing::debug;

// Transforms that need whole-byte samples; on 1/2/4-bit input they pull in UNPACK.
const NEEDS_UNPACK: TransformSet = TransformSet::EXPAND_PALETTE
    .union(TransformSet::TRNS_TO_ALPHA)
    .union(TransformSet::GRAY_TO_RGB);

fn meets(format: &PixelFormat, contract: &TransformContract) -> bool {
    let ct = format.color_type;
    let req = contract.requires;
    (!req.contains(TransformRequirement::INDEXED) || ct == ColorType::Indexed)
        && (!req.contains(TransformRequirement::GRAY) || ct.is_gray())
        && (!req.contains(TransformRequirement::RGB)
            || matches!(ct, ColorType::Rgb | ColorType::Rgba))
        && (!req.contains(TransformRequirement::ALPHA) || ct.has_alpha())
        && (!req.contains(TransformRequirement::NO_ALPHA) || !ct.has_alpha())
}

fn with_alpha(ct: ColorType) -> ColorType {
    match ct {
        ColorType::Grayscale => ColorType::GrayscaleAlpha,
        ColorType::Rgb | ColorType::Indexed => ColorType::Rgba,
        other => other,
    }
}

fn without_alpha(ct: ColorType) -> ColorType {
    match ct {
        ColorType::GrayscaleAlpha => ColorType::Grayscale,
        ColorType::Rgba => ColorType::Rgb,
        other => other,
    }
}

/// Multiplier that maps a `bits`-bit gray level onto 0..=255.
fn gray_scale_factor(bits: u8) -> u16 {
    match bits {
        1 => 0xFF,
        2 => 0x55,
        4 => 0x11,
        _ => 1,
    }
}

/// A resolved transform step, carrying whatever it needs from the header and
/// metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Step {
    Unpack { bits: u8, scale: u16 },
    ExpandPalette { palette: Vec<[u8; 3]>, alpha: Option<Vec<u8>> },
    KeyToAlpha { key: [u16; 3], channels: usize, sixteen: bool },
    Scale16,
    Strip16,
    InvertMono { channels: usize, bytes_per_sample: usize, packed_bits: Option<u8> },
    GrayToRgb { alpha: bool, bytes_per_sample: usize },
    Premultiply { channels: usize, sixteen: bool },
    StripAlpha { channels: usize, bytes_per_sample: usize },
    Bgr { channels: usize, bytes_per_sample: usize },
    SwapEndian,
}

impl Step {
    fn run(&self, src: &[u8], dst: &mut Vec<u8>, width: usize) {
        dst.clear();
        match self {
            Step::Unpack { bits, scale } => {
                let bits = usize::from(*bits);
                let mask = (1u16 << bits) - 1;
                dst.extend((0..width).map(|i| {
                    let bit = i * bits;
                    let byte = src.get(bit / 8).copied().unwrap_or(0);
                    let v = (u16::from(byte) >> (8 - bit % 8 - bits)) & mask;
                    (v * scale) as u8
                }));
            }
            Step::ExpandPalette { palette, alpha } => {
                for &index in &src[..width.min(src.len())] {
                    let i = usize::from(index);
                    // Out-of-range indices come out opaque black.
                    let rgb = palette.get(i).copied().unwrap_or([0, 0, 0]);
                    dst.extend_from_slice(&rgb);
                    if let Some(alpha) = alpha {
                        let a = if i < palette.len() {
                            alpha.get(i).copied().unwrap_or(0xFF)
                        } else {
                            0xFF
                        };
                        dst.push(a);
                    }
                }
            }
            Step::KeyToAlpha {
                key,
                channels,
                sixteen,
            } => {
                let bps = if *sixteen { 2 } else { 1 };
                for px in src.chunks_exact(channels * bps) {
                    let matches = (0..*channels).all(|c| {
                        let sample = if *sixteen {
                            u16::from_be_bytes([px[2 * c], px[2 * c + 1]])
                        } else {
                            u16::from(px[c])
                        };
                        sample == key[c]
                    });
                    dst.extend_from_slice(px);
                    let a = if matches { 0x00 } else { 0xFF };
                    dst.push(a);
                    if *sixteen {
                        dst.push(a);
                    }
                }
            }
            Step::Scale16 => {
                dst.extend(src.chunks_exact(2).map(|s| {
                    let v = u32::from(u16::from_be_bytes([s[0], s[1]]));
                    ((v * 255 + 32895) >> 16) as u8
                }));
            }
            Step::Strip16 => dst.extend(src.iter().step_by(2)),
            Step::InvertMono {
                channels,
                bytes_per_sample,
                packed_bits,
            } => {
                dst.extend_from_slice(src);
                match packed_bits {
                    Some(bits) => {
                        for b in dst.iter_mut() {
                            *b = !*b;
                        }
                        let used = width * usize::from(*bits) % 8;
                        if used != 0 {
                            if let Some(last) = dst.last_mut() {
                                *last &= 0xFF << (8 - used);
                            }
                        }
                    }
                    None => {
                        // Gray is the first sample of each pixel.
                        for px in dst.chunks_exact_mut(channels * bytes_per_sample) {
                            for b in &mut px[..*bytes_per_sample] {
                                *b = !*b;
                            }
                        }
                    }
                }
            }
            Step::GrayToRgb {
                alpha,
                bytes_per_sample,
            } => {
                let bps = *bytes_per_sample;
                let stride = if *alpha { 2 * bps } else { bps };
                for px in src.chunks_exact(stride) {
                    let gray = &px[..bps];
                    dst.extend_from_slice(gray);
                    dst.extend_from_slice(gray);
                    dst.extend_from_slice(gray);
                    if *alpha {
                        dst.extend_from_slice(&px[bps..]);
                    }
                }
            }
            Step::Premultiply { channels, sixteen } => {
                dst.extend_from_slice(src);
                if *sixteen {
                    for px in dst.chunks_exact_mut(channels * 2) {
                        let (color, a) = px.split_at_mut((channels - 1) * 2);
                        let a = u32::from(u16::from_be_bytes([a[0], a[1]]));
                        for s in color.chunks_exact_mut(2) {
                            let c = u32::from(u16::from_be_bytes([s[0], s[1]]));
                            let v = ((c * a + 32767) / 65535) as u16;
                            s.copy_from_slice(&v.to_be_bytes());
                        }
                    }
                } else {
                    for px in dst.chunks_exact_mut(*channels) {
                        let (color, a) = px.split_at_mut(channels - 1);
                        let a = u32::from(a[0]);
                        for c in color {
                            *c = ((u32::from(*c) * a + 127) / 255) as u8;
                        }
                    }
                }
            }
            Step::StripAlpha {
                channels,
                bytes_per_sample,
            } => {
                let keep = (channels - 1) * bytes_per_sample;
                for px in src.chunks_exact(channels * bytes_per_sample) {
                    dst.extend_from_slice(&px[..keep]);
                }
            }
            Step::Bgr {
                channels,
                bytes_per_sample,
            } => {
                dst.extend_from_slice(src);
                let bps = *bytes_per_sample;
                for px in dst.chunks_exact_mut(channels * bps) {
                    for i in 0..bps {
                        px.swap(i, 2 * bps + i);
                    }
                }
            }
            Step::SwapEndian => {
                dst.extend_from_slice(src);
                for s in dst.chunks_exact_mut(2) {
                    s.swap(0, 1);
                }
            }
        }
    }
}

/// The transforms that will actually run for one image, in order.
///
/// Built once per session before the first row; `apply_row` reuses its two
/// scratch buffers for every row.
#[derive(Clone, Debug)]
pub struct TransformPlan {
    requested: TransformSet,
    applied: Vec<Transform>,
    steps: Vec<Step>,
    input: PixelFormat,
    output: PixelFormat,
    front: Vec<u8>,
    back: Vec<u8>,
}

impl TransformPlan {
    /// Checks every requested transform against the pixel format it will see.
    pub fn new(set: TransformSet, header: &ImageHeader, metadata: &Metadata) -> Result<Self> {
        Self::with_fit(set, header, metadata, TransformFit::Strict)
    }

    /// Like [`TransformPlan::new`]; under [`TransformFit::BestEffort`] a
    /// transform whose contract is not met is left out of the plan.
    pub fn with_fit(
        set: TransformSet,
        header: &ImageHeader,
        metadata: &Metadata,
        fit: TransformFit,
    ) -> Result<Self> {
        let input = header.pixel_format();
        let mut format = input;
        let mut steps = Vec::new();
        let mut applied = Vec::new();
        let mut trns_consumed = false;
        let mut gray_scale = 1u16;

        let needs_unpack = set.contains(TransformSet::UNPACK) || set.intersects(NEEDS_UNPACK);

        for transform in Transform::ORDERED {
            // UNPACK may be implied without being requested.
            let requested = set.contains(transform.flag())
                || (transform == Transform::Unpack && needs_unpack);
            if !requested {
                continue;
            }
            if transform == Transform::TrnsToAlpha && trns_consumed {
                continue;
            }

            let contract = transform.contract();
            // Palette alpha only comes through EXPAND_PALETTE.
            let indexed_trns =
                transform == Transform::TrnsToAlpha && format.color_type == ColorType::Indexed;
            if indexed_trns || !meets(&format, &contract) {
                debug!(
                    transform = contract.name,
                    color_type = ?format.color_type,
                    ?fit,
                    "transform contract not met"
                );
                match fit {
                    TransformFit::BestEffort => continue,
                    TransformFit::Strict => {
                        return Err(StrictPngError::transform_unavailable(
                            contract.name,
                            format.color_type,
                        ))
                    }
                }
            }

            let bits = format.bit_depth.bits();
            let bps = if format.bit_depth == BitDepth::Sixteen { 2 } else { 1 };
            let channels = format.color_type.samples();

            let step = match transform {
                Transform::Unpack => {
                    if bits >= 8 {
                        None
                    } else {
                        let scale = if format.color_type.is_gray() {
                            gray_scale_factor(bits)
                        } else {
                            1
                        };
                        gray_scale = scale;
                        format.bit_depth = BitDepth::Eight;
                        Some(Step::Unpack { bits, scale })
                    }
                }
                Transform::ExpandPalette => {
                    let palette = metadata
                        .palette()
                        .ok_or_else(|| StrictPngError::invalid_format("indexed image without PLTE"))?
                        .to_vec();
                    let alpha = match metadata.transparency() {
                        Some(Transparency::Indexed(alpha))
                            if set.contains(TransformSet::TRNS_TO_ALPHA) =>
                        {
                            trns_consumed = true;
                            format.color_type = ColorType::Rgba;
                            Some(alpha.clone())
                        }
                        _ => {
                            format.color_type = ColorType::Rgb;
                            None
                        }
                    };
                    format.bit_depth = BitDepth::Eight;
                    Some(Step::ExpandPalette { palette, alpha })
                }
                Transform::TrnsToAlpha => {
                    // Keys only carry as many bits as the stored samples.
                    let depth_mask = match input.bit_depth {
                        BitDepth::Sixteen => u16::MAX,
                        depth => (1u16 << depth.bits()) - 1,
                    };
                    let key = match metadata.transparency() {
                        Some(&Transparency::Gray(g))
                            if format.color_type == ColorType::Grayscale =>
                        {
                            // Compare in the same scale the samples are in now.
                            let g = (g & depth_mask).wrapping_mul(gray_scale);
                            Some([g, 0, 0])
                        }
                        Some(&Transparency::Rgb(r, g, b)) if format.color_type == ColorType::Rgb => {
                            Some([r & depth_mask, g & depth_mask, b & depth_mask])
                        }
                        _ => None,
                    };
                    key.map(|key| {
                        format.color_type = with_alpha(format.color_type);
                        Step::KeyToAlpha {
                            key,
                            channels,
                            sixteen: bps == 2,
                        }
                    })
                }
                Transform::Scale16 if bits == 16 => {
                    format.bit_depth = BitDepth::Eight;
                    Some(Step::Scale16)
                }
                Transform::Strip16 if bits == 16 && !set.contains(TransformSet::SCALE_16) => {
                    format.bit_depth = BitDepth::Eight;
                    Some(Step::Strip16)
                }
                Transform::Scale16 | Transform::Strip16 => None,
                Transform::InvertMono => Some(Step::InvertMono {
                    channels,
                    bytes_per_sample: bps,
                    packed_bits: (bits < 8).then_some(bits),
                }),
                Transform::GrayToRgb => {
                    let alpha = format.color_type.has_alpha();
                    format.color_type = if alpha {
                        ColorType::Rgba
                    } else {
                        ColorType::Rgb
                    };
                    Some(Step::GrayToRgb {
                        alpha,
                        bytes_per_sample: bps,
                    })
                }
                Transform::PremultiplyAlpha => Some(Step::Premultiply {
                    channels,
                    sixteen: bps == 2,
                }),
                Transform::StripAlpha => {
                    format.color_type = without_alpha(format.color_type);
                    Some(Step::StripAlpha {
                        channels,
                        bytes_per_sample: bps,
                    })
                }
                Transform::Bgr => Some(Step::Bgr {
                    channels,
                    bytes_per_sample: bps,
                }),
                Transform::SwapEndian if bits == 16 => Some(Step::SwapEndian),
                Transform::SwapEndian => None,
            };

            if let Some(step) = step {
                steps.push(step);
                applied.push(transform);
            }
        }

        debug!(
            requested = ?set,
            applied = ?applied,
            input = ?input,
            output = ?format,
            "transform plan"
        );

        Ok(Self {
            requested: set,
            applied,
            steps,
            input,
            output: format,
            front: Vec::new(),
            back: Vec::new(),
        })
    }

    pub fn requested(&self) -> TransformSet {
        self.requested
    }

    /// Transforms that change the data, in execution order.
    pub fn applied(&self) -> &[Transform] {
        &self.applied
    }

    pub fn is_identity(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn input_format(&self) -> PixelFormat {
        self.input
    }

    pub fn output_format(&self) -> PixelFormat {
        self.output
    }

    /// Output bytes for a row of `width` pixels.
    pub fn output_row_bytes(&self, width: u32) -> Option<usize> {
        self.output.row_bytes(width)
    }

    /// Runs every step over one reconstructed row of `width` pixels.
    pub fn apply_row(&mut self, row: &[u8], width: u32) -> &[u8] {
        let width = width as usize;
        self.front.clear();
        self.front.extend_from_slice(row);
        for step in &self.steps {
            step.run(&self.front, &mut self.back, width);
            std::mem::swap(&mut self.front, &mut self.back);
        }
        &self.front
    }
}

/// Plans and applies `set` to one full-width row of `header`'s image.
pub fn apply(
    set: TransformSet,
    row: &[u8],
    header: &ImageHeader,
    metadata: &Metadata,
) -> Result<Vec<u8>> {
    let expected = header
        .row_bytes()
        .ok_or_else(|| StrictPngError::invalid_format("row size overflows"))?;
    if row.len() != expected {
        return Err(StrictPngError::truncated(expected, row.len()));
    }
    let mut plan = TransformPlan::new(set, header, metadata)?;
    Ok(plan.apply_row(row, header.width).to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::firewall::DecodeConfig;
    use crate::engine::header::InterlaceMethod;
    use crate::error::ErrorKind;

    fn header(width: u32, color_type: ColorType, bit_depth: BitDepth) -> ImageHeader {
        ImageHeader {
            width,
            height: 1,
            bit_depth,
            color_type,
            interlace: InterlaceMethod::None,
            compression_method: 0,
            filter_method: 0,
        }
    }

    fn palette_meta(hdr: &ImageHeader, plte: &[u8], trns: Option<&[u8]>) -> Metadata {
        let config = DecodeConfig::default();
        let mut meta = Metadata::default();
        meta.set_palette(plte, hdr, &config).unwrap();
        if let Some(trns) = trns {
            assert!(meta.set_transparency(trns, hdr, &config).unwrap());
        }
        meta
    }

    #[test]
    fn empty_set_is_identity() {
        let hdr = header(2, ColorType::Rgb, BitDepth::Eight);
        let row = [1, 2, 3, 4, 5, 6];
        let out = apply(TransformSet::empty(), &row, &hdr, &Metadata::default()).unwrap();
        assert_eq!(out, row);
    }

    #[test]
    fn unpack_scales_gray_and_keeps_indices() {
        let hdr = header(4, ColorType::Grayscale, BitDepth::Two);
        let out = apply(TransformSet::UNPACK, &[0b00_01_10_11], &hdr, &Metadata::default()).unwrap();
        assert_eq!(out, vec![0, 85, 170, 255]);

        let hdr = header(3, ColorType::Indexed, BitDepth::Four);
        let meta = palette_meta(&hdr, &[0; 48], None);
        let out = apply(TransformSet::UNPACK, &[0x1F, 0x20], &hdr, &meta).unwrap();
        assert_eq!(out, vec![1, 15, 2]);
    }

    #[test]
    fn unpack_is_noop_on_whole_bytes() {
        let hdr = header(1, ColorType::Grayscale, BitDepth::Eight);
        let plan = TransformPlan::new(TransformSet::UNPACK, &hdr, &Metadata::default()).unwrap();
        assert!(plan.is_identity());
    }

    #[test]
    fn expand_palette_with_and_without_alpha() {
        let hdr = header(3, ColorType::Indexed, BitDepth::Eight);
        let plte = [10, 20, 30, 40, 50, 60];
        let meta = palette_meta(&hdr, &plte, Some(&[0x80]));

        let out = apply(TransformSet::EXPAND_PALETTE, &[1, 0, 7], &hdr, &meta).unwrap();
        // index 7 is out of range -> opaque black
        assert_eq!(out, vec![40, 50, 60, 10, 20, 30, 0, 0, 0]);

        let out = apply(TransformSet::EXPAND, &[1, 0, 7], &hdr, &meta).unwrap();
        assert_eq!(
            out,
            vec![40, 50, 60, 0xFF, 10, 20, 30, 0x80, 0, 0, 0, 0xFF]
        );
    }

    #[test]
    fn expand_palette_implies_unpack() {
        let hdr = header(8, ColorType::Indexed, BitDepth::One);
        let meta = palette_meta(&hdr, &[0, 0, 0, 255, 255, 255], None);
        let out = apply(TransformSet::EXPAND_PALETTE, &[0b1000_0001], &hdr, &meta).unwrap();
        assert_eq!(out.len(), 24);
        assert_eq!(&out[..3], &[255, 255, 255]);
        assert_eq!(&out[3..6], &[0, 0, 0]);
        assert_eq!(&out[21..], &[255, 255, 255]);
    }

    #[test]
    fn trns_to_alpha_on_indexed_needs_expand_palette() {
        let hdr = header(1, ColorType::Indexed, BitDepth::Eight);
        let meta = palette_meta(&hdr, &[1, 2, 3], Some(&[0]));
        let err = TransformPlan::new(TransformSet::TRNS_TO_ALPHA, &hdr, &meta).unwrap_err();
        assert!(matches!(
            err,
            StrictPngError::TransformUnavailable {
                transform: "trns_to_alpha",
                color_type: ColorType::Indexed
            }
        ));
    }

    #[test]
    fn gray_key_becomes_alpha() {
        let hdr = header(3, ColorType::Grayscale, BitDepth::Eight);
        let config = DecodeConfig::default();
        let mut meta = Metadata::default();
        meta.set_transparency(&[0, 7], &hdr, &config).unwrap();
        let out = apply(TransformSet::TRNS_TO_ALPHA, &[7, 8, 7], &hdr, &meta).unwrap();
        assert_eq!(out, vec![7, 0, 8, 0xFF, 7, 0]);

        // 1-bit gray: key 1 means white after scaling.
        let hdr = header(2, ColorType::Grayscale, BitDepth::One);
        let mut meta = Metadata::default();
        meta.set_transparency(&[0, 1], &hdr, &config).unwrap();
        let out = apply(TransformSet::TRNS_TO_ALPHA, &[0b1000_0000], &hdr, &meta).unwrap();
        assert_eq!(out, vec![255, 0, 0, 0xFF]);
    }

    #[test]
    fn gray8_key_is_masked_to_sample_depth() {
        let hdr = header(2, ColorType::Grayscale, BitDepth::Eight);
        let config = DecodeConfig::default();
        let mut meta = Metadata::default();
        meta.set_transparency(&[0x01, 0x07], &hdr, &config).unwrap();
        let out = apply(TransformSet::TRNS_TO_ALPHA, &[7, 8], &hdr, &meta).unwrap();
        assert_eq!(out, vec![7, 0, 8, 0xFF]);

        let hdr = header(1, ColorType::Rgb, BitDepth::Eight);
        let mut meta = Metadata::default();
        meta.set_transparency(&[0xA0, 1, 0xB0, 2, 0xC0, 3], &hdr, &config).unwrap();
        let out = apply(TransformSet::TRNS_TO_ALPHA, &[1, 2, 3], &hdr, &meta).unwrap();
        assert_eq!(out, vec![1, 2, 3, 0]);
    }

    #[test]
    fn best_effort_skips_transforms_that_do_not_fit() {
        let rgb = header(2, ColorType::Rgb, BitDepth::Eight);
        let meta = Metadata::default();
        let set = TransformSet::EXPAND
            | TransformSet::STRIP_ALPHA
            | TransformSet::INVERT_MONO
            | TransformSet::BGR;
        assert!(TransformPlan::new(set, &rgb, &meta).is_err());
        let plan = TransformPlan::with_fit(set, &rgb, &meta, TransformFit::BestEffort).unwrap();
        assert_eq!(plan.applied(), &[Transform::Bgr]);
        assert_eq!(plan.output_format(), rgb.pixel_format());

        // EXPAND on low-depth gray still unpacks and scales.
        let gray = header(4, ColorType::Grayscale, BitDepth::Two);
        let mut plan =
            TransformPlan::with_fit(TransformSet::EXPAND, &gray, &meta, TransformFit::BestEffort)
                .unwrap();
        assert_eq!(plan.applied(), &[Transform::Unpack]);
        assert_eq!(plan.apply_row(&[0b00_01_10_11], 4), &[0, 85, 170, 255]);

        // Palette alpha without EXPAND_PALETTE is dropped, not an error.
        let indexed = header(1, ColorType::Indexed, BitDepth::Eight);
        let meta = palette_meta(&indexed, &[1, 2, 3], Some(&[0]));
        let plan = TransformPlan::with_fit(
            TransformSet::TRNS_TO_ALPHA,
            &indexed,
            &meta,
            TransformFit::BestEffort,
        )
        .unwrap();
        assert!(plan.is_identity());
    }

    #[test]
    fn rgb16_key_becomes_alpha() {
        let hdr = header(2, ColorType::Rgb, BitDepth::Sixteen);
        let config = DecodeConfig::default();
        let mut meta = Metadata::default();
        meta.set_transparency(&[0, 1, 0, 2, 0, 3], &hdr, &config).unwrap();
        let row = [0, 1, 0, 2, 0, 3, 0, 1, 0, 2, 0, 4];
        let out = apply(TransformSet::TRNS_TO_ALPHA, &row, &hdr, &meta).unwrap();
        assert_eq!(&out[6..8], &[0, 0]);
        assert_eq!(&out[14..16], &[0xFF, 0xFF]);
    }

    #[test]
    fn trns_to_alpha_without_trns_is_noop() {
        let hdr = header(1, ColorType::Rgb, BitDepth::Eight);
        let plan = TransformPlan::new(TransformSet::TRNS_TO_ALPHA, &hdr, &Metadata::default()).unwrap();
        assert!(plan.is_identity());
        assert_eq!(plan.output_format().color_type, ColorType::Rgb);
    }

    #[test]
    fn scale_wins_over_strip() {
        let hdr = header(1, ColorType::Grayscale, BitDepth::Sixteen);
        let meta = Metadata::default();
        let both = TransformSet::SCALE_16 | TransformSet::STRIP_16;
        // 0x00FF rounds up when scaled, truncates to 0 when stripped.
        assert_eq!(apply(both, &[0x00, 0xFF], &hdr, &meta).unwrap(), vec![0x01]);
        assert_eq!(
            apply(TransformSet::STRIP_16, &[0x00, 0xFF], &hdr, &meta).unwrap(),
            vec![0x00]
        );
        assert_eq!(
            apply(TransformSet::SCALE_16, &[0xFF, 0xFF], &hdr, &meta).unwrap(),
            vec![0xFF]
        );
        // No-op on 8-bit input.
        let hdr8 = header(1, ColorType::Grayscale, BitDepth::Eight);
        assert!(TransformPlan::new(both, &hdr8, &meta).unwrap().is_identity());
    }

    #[test]
    fn invert_mono_gray_alpha_and_packed() {
        let meta = Metadata::default();
        let hdr = header(1, ColorType::GrayscaleAlpha, BitDepth::Eight);
        assert_eq!(
            apply(TransformSet::INVERT_MONO, &[0x10, 0x20], &hdr, &meta).unwrap(),
            vec![0xEF, 0x20]
        );

        // 3 pixels at 1 bit: padding bits stay zero.
        let hdr = header(3, ColorType::Grayscale, BitDepth::One);
        assert_eq!(
            apply(TransformSet::INVERT_MONO, &[0b1010_0000], &hdr, &meta).unwrap(),
            vec![0b0100_0000]
        );

        let rgb = header(1, ColorType::Rgb, BitDepth::Eight);
        assert_eq!(
            TransformPlan::new(TransformSet::INVERT_MONO, &rgb, &meta)
                .unwrap_err()
                .kind(),
            ErrorKind::TransformUnavailable
        );
    }

    #[test]
    fn gray_to_rgb_then_bgr_order() {
        let meta = Metadata::default();
        let hdr = header(1, ColorType::GrayscaleAlpha, BitDepth::Eight);
        // BGR runs after GRAY_TO_RGB, so it sees RGBA.
        let set = TransformSet::GRAY_TO_RGB | TransformSet::BGR;
        assert_eq!(apply(set, &[9, 200], &hdr, &meta).unwrap(), vec![9, 9, 9, 200]);

        let rgb = header(1, ColorType::Rgb, BitDepth::Eight);
        assert_eq!(
            TransformPlan::new(TransformSet::GRAY_TO_RGB, &rgb, &meta)
                .unwrap_err()
                .kind(),
            ErrorKind::TransformUnavailable
        );
    }

    #[test]
    fn premultiply_rounding() {
        let meta = Metadata::default();
        let hdr = header(1, ColorType::Rgba, BitDepth::Eight);
        let out = apply(TransformSet::PREMULTIPLY_ALPHA, &[255, 128, 1, 128], &hdr, &meta).unwrap();
        // 255*128/255 = 128; (128*128+127)/255 = 64; (1*128+127)/255 = 1
        assert_eq!(out, vec![128, 64, 1, 128]);

        let hdr16 = header(1, ColorType::GrayscaleAlpha, BitDepth::Sixteen);
        let out = apply(
            TransformSet::PREMULTIPLY_ALPHA,
            &[0xFF, 0xFF, 0x80, 0x00],
            &hdr16,
            &meta,
        )
        .unwrap();
        assert_eq!(out, vec![0x80, 0x00, 0x80, 0x00]);

        let rgb = header(1, ColorType::Rgb, BitDepth::Eight);
        assert!(TransformPlan::new(TransformSet::PREMULTIPLY_ALPHA, &rgb, &meta).is_err());
    }

    #[test]
    fn strip_alpha_and_bgr_and_swap() {
        let meta = Metadata::default();
        let hdr = header(1, ColorType::Rgba, BitDepth::Sixteen);
        let row = [1, 2, 3, 4, 5, 6, 7, 8];
        let set = TransformSet::STRIP_ALPHA | TransformSet::BGR | TransformSet::SWAP_ENDIAN;
        let mut plan = TransformPlan::new(set, &hdr, &meta).unwrap();
        assert_eq!(plan.output_format().color_type, ColorType::Rgb);
        assert_eq!(plan.output_row_bytes(1), Some(6));
        assert_eq!(plan.apply_row(&row, 1), &[6, 5, 4, 3, 2, 1]);
        assert_eq!(
            plan.applied(),
            &[Transform::StripAlpha, Transform::Bgr, Transform::SwapEndian]
        );
    }

    #[test]
    fn premultiply_after_alpha_from_trns() {
        let hdr = header(1, ColorType::Indexed, BitDepth::Eight);
        let meta = palette_meta(&hdr, &[200, 100, 50], Some(&[0]));
        let set = TransformSet::EXPAND | TransformSet::PREMULTIPLY_ALPHA;
        assert_eq!(apply(set, &[0], &hdr, &meta).unwrap(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn wrong_row_length_is_rejected() {
        let hdr = header(2, ColorType::Rgb, BitDepth::Eight);
        let err = apply(TransformSet::empty(), &[0; 5], &hdr, &Metadata::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Truncated);
    }
}

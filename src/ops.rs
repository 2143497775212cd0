// src/ops.rs
//
// Pixel-format transforms a caller can request.
// A TransformSet is just flags; the order they run in is fixed (see Transform::ORDERED)
// and the planning/execution lives in engine/pipeline.rs.

use bitflags::bitflags;

bitflags! {
    /// Caller-selected output transforms.
    ///
    /// Bit values follow libpng's `PNG_TRANSFORM_*` where libpng has an
    /// equivalent; the remaining transforms use bits above 16.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct TransformSet: u32 {
        /// 16-bit samples -> 8-bit by dropping the low byte.
        const STRIP_16 = 0x0001;
        /// Drop the alpha channel.
        const STRIP_ALPHA = 0x0002;
        /// 1/2/4-bit samples -> one byte per sample.
        const UNPACK = 0x0004;
        /// Invert gray samples (0 becomes white).
        const INVERT_MONO = 0x0020;
        /// RGB(A) -> BGR(A).
        const BGR = 0x0080;
        /// 16-bit samples in little-endian order.
        const SWAP_ENDIAN = 0x0200;
        /// Gray(A) -> RGB(A).
        const GRAY_TO_RGB = 0x2000;
        /// 16-bit samples -> 8-bit with rounding.
        const SCALE_16 = 0x8000;
        /// Multiply color samples by alpha.
        const PREMULTIPLY_ALPHA = 0x1_0000;
        /// tRNS chunk -> a real alpha channel.
        const TRNS_TO_ALPHA = 0x2_0000;
        /// Palette indices -> RGB (or RGBA with TRNS_TO_ALPHA).
        const EXPAND_PALETTE = 0x4_0000;

        /// Palette/low-depth/tRNS expansion, as libpng's `png_set_expand`.
        const EXPAND = Self::UNPACK.bits() | Self::EXPAND_PALETTE.bits() | Self::TRNS_TO_ALPHA.bits();
    }
}

// libpng PNG_TRANSFORM_* values understood by from_libpng_bits.
const PNG_TRANSFORM_STRIP_16: u32 = 0x0001;
const PNG_TRANSFORM_STRIP_ALPHA: u32 = 0x0002;
const PNG_TRANSFORM_PACKING: u32 = 0x0004;
const PNG_TRANSFORM_EXPAND: u32 = 0x0010;
const PNG_TRANSFORM_INVERT_MONO: u32 = 0x0020;
const PNG_TRANSFORM_BGR: u32 = 0x0080;
const PNG_TRANSFORM_SWAP_ENDIAN: u32 = 0x0200;
const PNG_TRANSFORM_GRAY_TO_RGB: u32 = 0x2000;
const PNG_TRANSFORM_SCALE_16: u32 = 0x8000;

impl TransformSet {
    /// Maps a libpng `PNG_TRANSFORM_*` mask; bits without a counterpart are ignored.
    pub fn from_libpng_bits(bits: u32) -> Self {
        let table = [
            (PNG_TRANSFORM_STRIP_16, Self::STRIP_16),
            (PNG_TRANSFORM_STRIP_ALPHA, Self::STRIP_ALPHA),
            (PNG_TRANSFORM_PACKING, Self::UNPACK),
            (PNG_TRANSFORM_EXPAND, Self::EXPAND),
            (PNG_TRANSFORM_INVERT_MONO, Self::INVERT_MONO),
            (PNG_TRANSFORM_BGR, Self::BGR),
            (PNG_TRANSFORM_SWAP_ENDIAN, Self::SWAP_ENDIAN),
            (PNG_TRANSFORM_GRAY_TO_RGB, Self::GRAY_TO_RGB),
            (PNG_TRANSFORM_SCALE_16, Self::SCALE_16),
        ];
        table
            .into_iter()
            .filter(|(bit, _)| bits & bit != 0)
            .fold(Self::empty(), |acc, (_, set)| acc | set)
    }

    /// Requested transforms in execution order.
    pub fn ordered(self) -> impl Iterator<Item = Transform> {
        Transform::ORDERED
            .into_iter()
            .filter(move |t| self.contains(t.flag()))
    }
}

/// What planning does with a requested transform the image cannot take.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TransformFit {
    /// Fail with `TransformUnavailable`.
    #[default]
    Strict,
    /// Skip it and keep the rest, the way `png_read_png` ignores transforms
    /// that do not apply to the color type.
    BestEffort,
}

/// A single transform step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Transform {
    Unpack,
    ExpandPalette,
    TrnsToAlpha,
    Scale16,
    Strip16,
    InvertMono,
    GrayToRgb,
    PremultiplyAlpha,
    StripAlpha,
    Bgr,
    SwapEndian,
}

bitflags! {
    /// Color-type conditions a transform needs at the point it runs.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct TransformRequirement: u8 {
        const INDEXED = 1 << 0;
        const GRAY = 1 << 1;
        const RGB = 1 << 2;
        const ALPHA = 1 << 3;
        const NO_ALPHA = 1 << 4;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransformContract {
    pub name: &'static str,
    pub requires: TransformRequirement,
}

impl Transform {
    /// Expansion runs before anything that needs whole bytes or real alpha,
    /// premultiplication after every step that can introduce alpha.
    pub const ORDERED: [Transform; 11] = [
        Transform::Unpack,
        Transform::ExpandPalette,
        Transform::TrnsToAlpha,
        Transform::Scale16,
        Transform::Strip16,
        Transform::InvertMono,
        Transform::GrayToRgb,
        Transform::PremultiplyAlpha,
        Transform::StripAlpha,
        Transform::Bgr,
        Transform::SwapEndian,
    ];

    pub fn flag(self) -> TransformSet {
        match self {
            Transform::Unpack => TransformSet::UNPACK,
            Transform::ExpandPalette => TransformSet::EXPAND_PALETTE,
            Transform::TrnsToAlpha => TransformSet::TRNS_TO_ALPHA,
            Transform::Scale16 => TransformSet::SCALE_16,
            Transform::Strip16 => TransformSet::STRIP_16,
            Transform::InvertMono => TransformSet::INVERT_MONO,
            Transform::GrayToRgb => TransformSet::GRAY_TO_RGB,
            Transform::PremultiplyAlpha => TransformSet::PREMULTIPLY_ALPHA,
            Transform::StripAlpha => TransformSet::STRIP_ALPHA,
            Transform::Bgr => TransformSet::BGR,
            Transform::SwapEndian => TransformSet::SWAP_ENDIAN,
        }
    }

    pub fn contract(self) -> TransformContract {
        let (name, requires) = match self {
            Transform::Unpack => ("unpack", TransformRequirement::empty()),
            Transform::ExpandPalette => ("expand_palette", TransformRequirement::INDEXED),
            Transform::TrnsToAlpha => ("trns_to_alpha", TransformRequirement::NO_ALPHA),
            Transform::Scale16 => ("scale_16", TransformRequirement::empty()),
            Transform::Strip16 => ("strip_16", TransformRequirement::empty()),
            Transform::InvertMono => ("invert_mono", TransformRequirement::GRAY),
            Transform::GrayToRgb => ("gray_to_rgb", TransformRequirement::GRAY),
            Transform::PremultiplyAlpha => ("premultiply_alpha", TransformRequirement::ALPHA),
            Transform::StripAlpha => ("strip_alpha", TransformRequirement::ALPHA),
            Transform::Bgr => ("bgr", TransformRequirement::RGB),
            Transform::SwapEndian => ("swap_endian", TransformRequirement::empty()),
        };
        TransformContract { name, requires }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_follows_fixed_order_not_insertion() {
        let set = TransformSet::PREMULTIPLY_ALPHA | TransformSet::EXPAND_PALETTE;
        let order: Vec<_> = set.ordered().collect();
        assert_eq!(
            order,
            vec![Transform::ExpandPalette, Transform::PremultiplyAlpha]
        );
    }

    #[test]
    fn expand_is_composite() {
        assert!(TransformSet::EXPAND.contains(TransformSet::UNPACK));
        assert!(TransformSet::EXPAND.contains(TransformSet::EXPAND_PALETTE));
        assert!(TransformSet::EXPAND.contains(TransformSet::TRNS_TO_ALPHA));
        assert_eq!(TransformSet::EXPAND.ordered().count(), 3);
    }

    #[test]
    fn libpng_mask_mapping() {
        assert_eq!(TransformSet::from_libpng_bits(0), TransformSet::empty());
        assert_eq!(
            TransformSet::from_libpng_bits(0x0010),
            TransformSet::EXPAND
        );
        assert_eq!(
            TransformSet::from_libpng_bits(0x0001 | 0x2000),
            TransformSet::STRIP_16 | TransformSet::GRAY_TO_RGB
        );
        // PNG_TRANSFORM_SHIFT has no counterpart.
        assert_eq!(TransformSet::from_libpng_bits(0x0040), TransformSet::empty());
        assert_eq!(
            TransformSet::from_libpng_bits(u32::MAX).ordered().count(),
            // everything except premultiply
            10
        );
    }

    #[test]
    fn every_transform_has_a_contract_and_flag() {
        for t in Transform::ORDERED {
            assert!(!t.contract().name.is_empty());
            assert_eq!(t.flag().bits().count_ones(), 1);
        }
    }
}

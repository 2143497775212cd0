// src/engine/firewall.rs
//
// Decode configuration and resource-limit enforcement.
// Every budget here is checked before the corresponding allocation happens.

use crate::engine::header::{ImageHeader, MAX_DIMENSION};
use crate::error::{Result, StrictPngError};
use crate::ops::{TransformFit, TransformSet};
use tracing::debug;

const FUZZING_MAX_CHUNK_BYTES: u64 = 8_000_000;
const FUZZING_MAX_PIXELS: u64 = 1 << 20;
const FUZZING_MAX_HEIGHT: u32 = 1 << 10; // same bound the libFuzzer harness used
const FUZZING_METADATA_LIMIT: u64 = 8_000_000;

const STRICT_MAX_CHUNK_BYTES: u64 = 1024 * 1024;
const STRICT_MAX_PIXELS: u64 = 40_000_000; // ~8K x 5K
const STRICT_MAX_HEIGHT: u32 = 32768;
const STRICT_METADATA_LIMIT: u64 = 64 * 1024;

const LENIENT_MAX_CHUNK_BYTES: u64 = 64 * 1024 * 1024;
const LENIENT_MAX_PIXELS: u64 = 100_000_000; // 100 MP, 400MB as RGBA8
const LENIENT_MAX_HEIGHT: u32 = 65535;
const LENIENT_METADATA_LIMIT: u64 = 16 * 1024 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodePolicy {
    /// Small budgets meant for fuzzing and other adversarial input. The default.
    Fuzzing,
    Strict,
    /// Larger budgets and CRC mismatches tolerated.
    Lenient,
    /// Only the format's own maxima apply.
    Custom,
}

impl DecodePolicy {
    pub fn parse(policy: &str) -> Result<Self> {
        match policy.to_ascii_lowercase().as_str() {
            "fuzzing" => Ok(Self::Fuzzing),
            "strict" => Ok(Self::Strict),
            "lenient" => Ok(Self::Lenient),
            "custom" => Ok(Self::Custom),
            _ => Err(StrictPngError::invalid_policy(policy.to_owned())),
        }
    }
}

/// Everything a decode session is allowed to do.
///
/// Built explicitly by the caller; nothing is read from the environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodeConfig {
    pub policy: DecodePolicy,
    /// Cap on a single chunk's declared length.
    pub max_chunk_bytes: u64,
    /// Cap on `width * height`.
    pub max_pixel_count: u64,
    pub max_height: u32,
    /// Record CRC mismatches instead of failing.
    pub quiet_crc: bool,
    pub transforms: TransformSet,
    pub transform_fit: TransformFit,
    /// Cap on stored ancillary chunk bytes and on an inflated ICC profile.
    pub max_metadata_bytes: u64,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self::fuzzing()
    }
}

impl DecodeConfig {
    pub fn fuzzing() -> Self {
        Self {
            policy: DecodePolicy::Fuzzing,
            max_chunk_bytes: FUZZING_MAX_CHUNK_BYTES,
            max_pixel_count: FUZZING_MAX_PIXELS,
            max_height: FUZZING_MAX_HEIGHT,
            quiet_crc: false,
            transforms: TransformSet::empty(),
            transform_fit: TransformFit::Strict,
            max_metadata_bytes: FUZZING_METADATA_LIMIT,
        }
    }

    pub fn strict() -> Self {
        Self {
            policy: DecodePolicy::Strict,
            max_chunk_bytes: STRICT_MAX_CHUNK_BYTES,
            max_pixel_count: STRICT_MAX_PIXELS,
            max_height: STRICT_MAX_HEIGHT,
            quiet_crc: false,
            transforms: TransformSet::empty(),
            transform_fit: TransformFit::Strict,
            max_metadata_bytes: STRICT_METADATA_LIMIT,
        }
    }

    pub fn lenient() -> Self {
        Self {
            policy: DecodePolicy::Lenient,
            max_chunk_bytes: LENIENT_MAX_CHUNK_BYTES,
            max_pixel_count: LENIENT_MAX_PIXELS,
            max_height: LENIENT_MAX_HEIGHT,
            quiet_crc: true,
            transforms: TransformSet::empty(),
            transform_fit: TransformFit::Strict,
            max_metadata_bytes: LENIENT_METADATA_LIMIT,
        }
    }

    pub fn custom() -> Self {
        Self {
            policy: DecodePolicy::Custom,
            max_chunk_bytes: u64::MAX,
            max_pixel_count: u64::MAX,
            max_height: MAX_DIMENSION,
            quiet_crc: false,
            transforms: TransformSet::empty(),
            transform_fit: TransformFit::Strict,
            max_metadata_bytes: u64::MAX,
        }
    }

    pub fn apply_policy(policy: DecodePolicy) -> Self {
        match policy {
            DecodePolicy::Fuzzing => Self::fuzzing(),
            DecodePolicy::Strict => Self::strict(),
            DecodePolicy::Lenient => Self::lenient(),
            DecodePolicy::Custom => Self::custom(),
        }
    }

    pub fn with_transforms(mut self, transforms: TransformSet) -> Self {
        self.transforms = transforms;
        self
    }

    /// Transforms from a libpng `PNG_TRANSFORM_*` mask. Those that do not
    /// fit the image are skipped rather than failing the decode.
    pub fn with_libpng_transforms(mut self, mask: u32) -> Self {
        self.transforms = TransformSet::from_libpng_bits(mask);
        self.transform_fit = TransformFit::BestEffort;
        self
    }

    pub fn with_transform_fit(mut self, fit: TransformFit) -> Self {
        self.transform_fit = fit;
        self
    }

    pub fn with_quiet_crc(mut self, quiet_crc: bool) -> Self {
        self.quiet_crc = quiet_crc;
        self
    }

    pub fn enforce_pixels(&self, width: u32, height: u32) -> Result<()> {
        let pixels = u64::from(width) * u64::from(height);
        if pixels > self.max_pixel_count {
            debug!(width, height, limit = self.max_pixel_count, "pixel budget exceeded");
            return Err(StrictPngError::pixel_count_exceeds_limit(
                pixels,
                self.max_pixel_count,
            ));
        }
        Ok(())
    }

    pub fn enforce_height(&self, height: u32) -> Result<()> {
        if height > self.max_height {
            debug!(height, limit = self.max_height, "height budget exceeded");
            return Err(StrictPngError::dimension_exceeds_limit(
                height,
                self.max_height,
            ));
        }
        Ok(())
    }

    /// Both header budgets; runs before any row buffer exists.
    pub fn enforce_header(&self, header: &ImageHeader) -> Result<()> {
        self.enforce_pixels(header.width, header.height)?;
        self.enforce_height(header.height)
    }

    pub fn enforce_metadata(&self, total_bytes: u64) -> Result<()> {
        if total_bytes > self.max_metadata_bytes {
            return Err(StrictPngError::metadata_exceeds_limit(
                total_bytes,
                self.max_metadata_bytes,
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn default_matches_fuzzing_budgets() {
        let cfg = DecodeConfig::default();
        assert_eq!(cfg.policy, DecodePolicy::Fuzzing);
        assert_eq!(cfg.max_chunk_bytes, 8_000_000);
        assert_eq!(cfg.max_pixel_count, 1 << 20);
        assert_eq!(cfg.max_height, 1 << 10);
        assert!(!cfg.quiet_crc);
        assert!(cfg.transforms.is_empty());
        assert_eq!(cfg.transform_fit, TransformFit::Strict);
    }

    #[test]
    fn pixel_budget_is_inclusive() {
        let cfg = DecodeConfig::fuzzing();
        assert!(cfg.enforce_pixels(1024, 1024).is_ok());
        let err = cfg.enforce_pixels(1025, 1024).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExceedsLimits);
    }

    #[test]
    fn pixel_product_does_not_overflow() {
        let cfg = DecodeConfig::strict();
        assert!(cfg.enforce_pixels(u32::MAX, u32::MAX).is_err());
    }

    #[test]
    fn height_budget() {
        let cfg = DecodeConfig::fuzzing();
        assert!(cfg.enforce_height(1024).is_ok());
        assert!(matches!(
            cfg.enforce_height(1025).unwrap_err(),
            StrictPngError::DimensionExceedsLimit {
                dimension: 1025,
                max: 1024
            }
        ));
    }

    #[test]
    fn policies_parse_and_apply() {
        assert_eq!(DecodePolicy::parse("Strict").unwrap(), DecodePolicy::Strict);
        assert_eq!(
            DecodePolicy::parse("lenient").unwrap(),
            DecodePolicy::Lenient
        );
        let err = DecodePolicy::parse("yolo").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);

        assert!(DecodeConfig::apply_policy(DecodePolicy::Lenient).quiet_crc);
        assert_eq!(
            DecodeConfig::apply_policy(DecodePolicy::Custom).max_pixel_count,
            u64::MAX
        );
    }

    #[test]
    fn metadata_budget() {
        let cfg = DecodeConfig::strict();
        assert!(cfg.enforce_metadata(64 * 1024).is_ok());
        assert_eq!(
            cfg.enforce_metadata(64 * 1024 + 1).unwrap_err().kind(),
            ErrorKind::ExceedsLimits
        );
    }

    #[test]
    fn builders_set_fields() {
        let cfg = DecodeConfig::strict()
            .with_quiet_crc(true)
            .with_transforms(TransformSet::GRAY_TO_RGB);
        assert!(cfg.quiet_crc);
        assert_eq!(cfg.transforms, TransformSet::GRAY_TO_RGB);
        assert_eq!(cfg.transform_fit, TransformFit::Strict);

        let cfg = DecodeConfig::fuzzing().with_libpng_transforms(0x0010);
        assert_eq!(cfg.transforms, TransformSet::EXPAND);
        assert_eq!(cfg.transform_fit, TransformFit::BestEffort);
    }
}

// src/error.rs
//
// Unified error handling for strict-png
// Uses thiserror for simple, type-safe error handling
//
// Error Taxonomy:
// - UserError: API misuse or bad configuration, recoverable
// - CodecError: malformed or unsupported PNG data
// - ResourceLimit: pixel/dimension/metadata budgets
// - InternalBug: Library bugs (should not happen)

use crate::engine::{ChunkType, ColorType, SessionState};
use std::borrow::Cow;
use thiserror::Error;

/// Error taxonomy used by callers that only care about who can fix the problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCategory {
    /// API misuse or bad configuration, recoverable by the caller
    UserError,
    /// Malformed or unsupported PNG data
    CodecError,
    /// Pixel/dimension/chunk/metadata budget exceeded
    ResourceLimit,
    /// Library bugs (should not happen)
    InternalBug,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::UserError => "UserError",
            ErrorCategory::CodecError => "CodecError",
            ErrorCategory::ResourceLimit => "ResourceLimit",
            ErrorCategory::InternalBug => "InternalBug",
        }
    }
}

/// Coarse failure kind of a decode attempt.
///
/// This is what a fuzz driver or batch caller matches on; the full
/// [`StrictPngError`] carries the details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Input exhausted before an expected field.
    Truncated,
    /// Chunk CRC did not match and quiet-CRC mode was off.
    ChecksumMismatch,
    /// Declared chunk length exceeds the configured cap.
    ChunkTooLarge,
    /// Illegal structure: bad signature, bad header pairing, corrupt data.
    InvalidFormat,
    /// Compression/filter/interlace method outside the defined values.
    UnsupportedMethod,
    /// Pixel, height or metadata budget violation.
    ExceedsLimits,
    /// Unrecognized per-row filter tag.
    InvalidFilter,
    /// Requested transform is incompatible with the color type.
    TransformUnavailable,
    /// Operation called in the wrong session state.
    InvalidState,
    /// Unknown configuration value.
    InvalidConfig,
    /// A panic was caught at an isolation boundary.
    Internal,
}

/// strict-png error types
#[derive(Debug, Clone, Error)]
pub enum StrictPngError {
    // Truncation
    #[error("Input truncated: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("Image data ended after {rows_read} of {rows_expected} rows")]
    MissingImageData { rows_read: u64, rows_expected: u64 },

    #[error("Stream ended without an IEND chunk")]
    MissingEnd,

    // Chunk framing
    #[error("CRC mismatch in {chunk} chunk: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch {
        chunk: ChunkType,
        stored: u32,
        computed: u32,
    },

    #[error("{chunk} chunk length {length} exceeds maximum {max}")]
    ChunkTooLarge {
        chunk: ChunkType,
        length: u32,
        max: u64,
    },

    // Format errors
    #[error("Not a PNG file (bad signature)")]
    InvalidSignature,

    #[error("Invalid PNG: {message}")]
    InvalidFormat { message: Cow<'static, str> },

    #[error("Corrupt image data: {message}")]
    CorruptImageData { message: Cow<'static, str> },

    #[error("Unsupported {field} method {value}")]
    UnsupportedMethod { field: &'static str, value: u8 },

    #[error("Unknown filter type {filter} on row {line}")]
    InvalidFilter { filter: u8, line: u32 },

    // Size Limit Errors
    #[error("Image pixel count {pixels} exceeds maximum {max}")]
    PixelCountExceedsLimit { pixels: u64, max: u64 },

    #[error("Image dimension {dimension} exceeds maximum {max}")]
    DimensionExceedsLimit { dimension: u32, max: u32 },

    #[error("Metadata size {size} exceeds maximum {max}")]
    MetadataExceedsLimit { size: u64, max: u64 },

    #[error("Cannot allocate {bytes} bytes for {buffer}")]
    AllocationFailed { buffer: &'static str, bytes: u64 },

    // Transform errors
    #[error("Transform {transform} is unavailable for {color_type:?} images")]
    TransformUnavailable {
        transform: &'static str,
        color_type: ColorType,
    },

    // State / configuration errors
    #[error("Cannot {operation} while the session is {state:?}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    #[error("Unknown decode policy: '{policy}'. Expected fuzzing, strict, lenient or custom")]
    InvalidPolicy { policy: Cow<'static, str> },

    // Internal Errors
    #[error("Internal error: {message}")]
    InternalPanic { message: Cow<'static, str> },
}

// Constructor Helpers
impl StrictPngError {
    pub fn truncated(needed: usize, remaining: usize) -> Self {
        Self::Truncated { needed, remaining }
    }

    pub fn missing_image_data(rows_read: u64, rows_expected: u64) -> Self {
        Self::MissingImageData {
            rows_read,
            rows_expected,
        }
    }

    pub fn missing_end() -> Self {
        Self::MissingEnd
    }

    pub fn checksum_mismatch(chunk: ChunkType, stored: u32, computed: u32) -> Self {
        Self::ChecksumMismatch {
            chunk,
            stored,
            computed,
        }
    }

    pub fn chunk_too_large(chunk: ChunkType, length: u32, max: u64) -> Self {
        Self::ChunkTooLarge { chunk, length, max }
    }

    pub fn invalid_signature() -> Self {
        Self::InvalidSignature
    }

    pub fn invalid_format(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    pub fn corrupt_image_data(message: impl Into<Cow<'static, str>>) -> Self {
        Self::CorruptImageData {
            message: message.into(),
        }
    }

    pub fn unsupported_method(field: &'static str, value: u8) -> Self {
        Self::UnsupportedMethod { field, value }
    }

    pub fn invalid_filter(filter: u8, line: u32) -> Self {
        Self::InvalidFilter { filter, line }
    }

    pub fn pixel_count_exceeds_limit(pixels: u64, max: u64) -> Self {
        Self::PixelCountExceedsLimit { pixels, max }
    }

    pub fn dimension_exceeds_limit(dimension: u32, max: u32) -> Self {
        Self::DimensionExceedsLimit { dimension, max }
    }

    pub fn metadata_exceeds_limit(size: u64, max: u64) -> Self {
        Self::MetadataExceedsLimit { size, max }
    }

    pub fn allocation_failed(buffer: &'static str, bytes: u64) -> Self {
        Self::AllocationFailed { buffer, bytes }
    }

    pub fn transform_unavailable(transform: &'static str, color_type: ColorType) -> Self {
        Self::TransformUnavailable {
            transform,
            color_type,
        }
    }

    pub fn invalid_state(operation: &'static str, state: SessionState) -> Self {
        Self::InvalidState { operation, state }
    }

    pub fn invalid_policy(policy: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidPolicy {
            policy: policy.into(),
        }
    }

    pub fn internal_panic(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InternalPanic {
            message: message.into(),
        }
    }

    /// The coarse failure kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Truncated { .. } | Self::MissingImageData { .. } | Self::MissingEnd => {
                ErrorKind::Truncated
            }
            Self::ChecksumMismatch { .. } => ErrorKind::ChecksumMismatch,
            Self::ChunkTooLarge { .. } => ErrorKind::ChunkTooLarge,
            Self::InvalidSignature | Self::InvalidFormat { .. } | Self::CorruptImageData { .. } => {
                ErrorKind::InvalidFormat
            }
            Self::UnsupportedMethod { .. } => ErrorKind::UnsupportedMethod,
            Self::InvalidFilter { .. } => ErrorKind::InvalidFilter,
            Self::PixelCountExceedsLimit { .. }
            | Self::DimensionExceedsLimit { .. }
            | Self::MetadataExceedsLimit { .. }
            | Self::AllocationFailed { .. } => ErrorKind::ExceedsLimits,
            Self::TransformUnavailable { .. } => ErrorKind::TransformUnavailable,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::InvalidPolicy { .. } => ErrorKind::InvalidConfig,
            Self::InternalPanic { .. } => ErrorKind::Internal,
        }
    }

    /// Check if this error is recoverable (caller can fix it)
    ///
    /// Consistent with category(): UserError and ResourceLimit errors can be
    /// fixed by changing the call sequence or the configured budgets.
    pub fn is_recoverable(&self) -> bool {
        match self.category() {
            ErrorCategory::UserError | ErrorCategory::ResourceLimit => true,
            ErrorCategory::CodecError | ErrorCategory::InternalBug => false,
        }
    }

    /// Get the error category for this error
    pub fn category(&self) -> ErrorCategory {
        match self.kind() {
            ErrorKind::TransformUnavailable | ErrorKind::InvalidState | ErrorKind::InvalidConfig => {
                ErrorCategory::UserError
            }

            ErrorKind::Truncated
            | ErrorKind::ChecksumMismatch
            | ErrorKind::InvalidFormat
            | ErrorKind::UnsupportedMethod
            | ErrorKind::InvalidFilter => ErrorCategory::CodecError,

            // An oversized chunk is rejected by the configured cap, not by the format.
            ErrorKind::ChunkTooLarge | ErrorKind::ExceedsLimits => ErrorCategory::ResourceLimit,

            ErrorKind::Internal => ErrorCategory::InternalBug,
        }
    }
}

// Result type alias
pub type Result<T> = std::result::Result<T, StrictPngError>;

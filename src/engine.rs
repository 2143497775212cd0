// src/engine.rs
//
// The decode engine. A DecodeSession walks one PNG stream through:
// 1. signature and IHDR validation against the configured budgets
// 2. pre-IDAT ancillary chunks (PLTE, tRNS, everything else stored raw)
// 3. row-by-row inflate, unfilter and transform
// 4. trailing chunks up to IEND
//
// This file is a facade over the modules in engine/.

// =============================================================================
// MODULE DECOMPOSITION
// =============================================================================

pub mod chunk;
pub mod cursor;
pub mod filter;
pub mod firewall;
pub mod header;
pub mod interlace;
pub mod metadata;
pub mod pipeline;
pub mod session;

mod api;
mod common;
mod pool;
mod scanline;
mod tasks;
mod zlib;

// Re-export commonly used types and functions
pub use api::{decode_png, DecodedImage};
pub use chunk::{chunk_crc, Chunk, ChunkParser, ChunkType};
pub use common::run_with_panic_policy;
pub use cursor::ByteCursor;
pub use filter::{reconstruct, unfilter, FilterType};
pub use firewall::{DecodeConfig, DecodePolicy};
pub use header::{BitDepth, ColorType, ImageHeader, InterlaceMethod, PixelFormat};
pub use interlace::{PassGeometry, RowInfo, RowIter};
pub use metadata::{IccProfile, Metadata, RawChunk, Transparency};
pub use pipeline::TransformPlan;
pub use pool::{default_thread_count, get_pool};
pub use session::{DecodeSession, OutputInfo, Row, SessionState, MIN_HEADER_LEN, PNG_SIGNATURE};
pub use tasks::{decode_batch, decode_batch_in, BatchResult, DecodeTask};
pub use zlib::inflate_bounded;

// src/engine/zlib.rs
//
// Thin wrappers around flate2's streaming Decompress: one for the IDAT stream
// (inflates into caller-owned scanline slots) and one bounded one-shot inflate
// for compressed metadata.

use crate::error::{Result, StrictPngError};
use flate2::{Decompress, DecompressError, FlushDecompress, Status};

const INFLATE_STEP: u64 = 32 * 1024;

fn corrupt(err: DecompressError) -> StrictPngError {
    StrictPngError::corrupt_image_data(format!("zlib stream: {err}"))
}

/// Result of one `ZlibStream::inflate` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Progress {
    pub consumed: usize,
    pub produced: usize,
    pub stream_end: bool,
}

/// Incremental zlib decoder that can be fed input split at arbitrary points.
pub struct ZlibStream {
    inner: Decompress,
    finished: bool,
}

impl std::fmt::Debug for ZlibStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZlibStream")
            .field("total_in", &self.inner.total_in())
            .field("total_out", &self.inner.total_out())
            .field("finished", &self.finished)
            .finish()
    }
}

impl Default for ZlibStream {
    fn default() -> Self {
        Self::new()
    }
}

impl ZlibStream {
    pub fn new() -> Self {
        Self {
            inner: Decompress::new(true),
            finished: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn total_out(&self) -> u64 {
        self.inner.total_out()
    }

    /// Inflates as much of `input` as fits into `output`.
    pub fn inflate(&mut self, input: &[u8], output: &mut [u8]) -> Result<Progress> {
        if self.finished {
            return Ok(Progress {
                consumed: 0,
                produced: 0,
                stream_end: true,
            });
        }
        let in_before = self.inner.total_in();
        let out_before = self.inner.total_out();
        let status = self
            .inner
            .decompress(input, output, FlushDecompress::None)
            .map_err(corrupt)?;
        self.finished = status == Status::StreamEnd;
        Ok(Progress {
            consumed: (self.inner.total_in() - in_before) as usize,
            produced: (self.inner.total_out() - out_before) as usize,
            stream_end: self.finished,
        })
    }
}

/// Output of [`inflate_bounded`].
#[derive(Debug)]
pub struct Inflated {
    pub data: Vec<u8>,
    /// False if the input ran out before the end of the zlib stream.
    pub complete: bool,
}

/// Inflates a whole zlib stream, failing as soon as the output would exceed
/// `max_bytes`. Output memory never grows past `max_bytes + 1`.
pub fn inflate_bounded(data: &[u8], max_bytes: u64) -> Result<Inflated> {
    let mut stream = Decompress::new(true);
    let mut out: Vec<u8> = Vec::new();
    let mut input = data;

    loop {
        let room = max_bytes
            .saturating_add(1)
            .saturating_sub(out.len() as u64)
            .min(INFLATE_STEP) as usize;
        if out.capacity() - out.len() < room {
            out.reserve_exact(room);
        }

        let in_before = stream.total_in();
        let out_before = out.len();
        let status = stream
            .decompress_vec(input, &mut out, FlushDecompress::None)
            .map_err(corrupt)?;
        let consumed = (stream.total_in() - in_before) as usize;
        input = &input[consumed..];

        if out.len() as u64 > max_bytes {
            return Err(StrictPngError::metadata_exceeds_limit(
                out.len() as u64,
                max_bytes,
            ));
        }
        if status == Status::StreamEnd {
            return Ok(Inflated {
                data: out,
                complete: true,
            });
        }
        if consumed == 0 && out.len() == out_before {
            if input.is_empty() {
                return Ok(Inflated {
                    data: out,
                    complete: false,
                });
            }
            return Err(StrictPngError::corrupt_image_data(
                "zlib stream made no progress",
            ));
        }
    }
}

// src/engine/session.rs
//
// DecodeSession: the resumable decode state machine.
//
//   Created --read_header--> HeaderRead --begin_rows--> RowsReading --finalize--> Finalized
//
// Any decode error moves the session to Failed and drops every row buffer.
// Calling an operation in the wrong state is an InvalidState error and leaves
// the state as it was.

use crate::engine::chunk::{self, Chunk, ChunkParser, CHUNK_OVERHEAD};
use crate::engine::cursor::ByteCursor;
use crate::engine::firewall::DecodeConfig;
use crate::engine::header::{self, BitDepth, ColorType, ImageHeader, PixelFormat, IHDR_LENGTH};
use crate::engine::interlace::{self, RowInfo, RowIter};
use crate::engine::metadata::Metadata;
use crate::engine::pipeline::TransformPlan;
use crate::engine::scanline::ScanlineBuffer;
use crate::engine::zlib::ZlibStream;
use crate::error::{Result, StrictPngError};
use crate::ops::TransformSet;
use tracing::{debug, trace};

/// The eight bytes every PNG stream starts with.
pub const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

/// Signature plus a complete IHDR chunk: nothing shorter can be decoded.
pub const MIN_HEADER_LEN: usize = PNG_SIGNATURE.len() + CHUNK_OVERHEAD + IHDR_LENGTH;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    HeaderRead,
    RowsReading,
    Finalized,
    Failed,
}

/// One decoded, transformed row. `pass` is 0 for non-interlaced images and
/// 1..=7 for Adam7; `line` counts rows within the pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Row<'s> {
    pub pass: u8,
    pub line: u32,
    /// Pixels in this row.
    pub width: u32,
    pub data: &'s [u8],
}

/// Shape of the rows the session hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputInfo {
    pub width: u32,
    pub height: u32,
    pub color_type: ColorType,
    pub bit_depth: BitDepth,
    /// Bytes in one full-width output row.
    pub line_size: usize,
    pub interlaced: bool,
    pub transforms: TransformSet,
}

impl OutputInfo {
    pub fn pixel_format(&self) -> PixelFormat {
        PixelFormat {
            color_type: self.color_type,
            bit_depth: self.bit_depth,
        }
    }
}

// Everything that only exists while rows are being read.
#[derive(Debug)]
struct RowState<'a> {
    inflater: ZlibStream,
    pending: &'a [u8],
    rows: RowIter,
    scanlines: ScanlineBuffer,
    plan: TransformPlan,
    format: PixelFormat,
    out: Vec<u8>,
}

#[derive(Debug)]
pub struct DecodeSession<'a> {
    config: DecodeConfig,
    state: SessionState,
    cursor: ByteCursor<'a>,
    parser: ChunkParser,
    header: Option<ImageHeader>,
    metadata: Metadata,
    first_idat: &'a [u8],
    rows: Option<RowState<'a>>,
    rows_read: u64,
    rows_expected: u64,
    output: Option<OutputInfo>,
}

impl<'a> DecodeSession<'a> {
    /// Checks the signature and that a full IHDR could fit. Nothing is
    /// allocated for rows until [`begin_rows`](Self::begin_rows).
    pub fn new(data: &'a [u8], config: DecodeConfig) -> Result<Self> {
        if data.len() < MIN_HEADER_LEN {
            return Err(StrictPngError::truncated(MIN_HEADER_LEN, data.len()));
        }
        let mut cursor = ByteCursor::new(data);
        if cursor.read_array::<8>()? != PNG_SIGNATURE {
            return Err(StrictPngError::invalid_signature());
        }
        Ok(Self {
            parser: ChunkParser::from_config(&config),
            config,
            state: SessionState::Created,
            cursor,
            header: None,
            metadata: Metadata::default(),
            first_idat: &[],
            rows: None,
            rows_read: 0,
            rows_expected: 0,
            output: None,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &DecodeConfig {
        &self.config
    }

    pub fn header(&self) -> Option<&ImageHeader> {
        self.header.as_ref()
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Known once rows have begun.
    pub fn output_info(&self) -> Option<&OutputInfo> {
        self.output.as_ref()
    }

    pub fn crc_mismatches(&self) -> u32 {
        self.parser.crc_mismatches()
    }

    /// Rows still to come across all passes; 0 outside `RowsReading`.
    pub fn rows_remaining(&self) -> u64 {
        self.rows.as_ref().map_or(0, |rs| rs.rows.remaining())
    }

    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    fn expect_state(&self, operation: &'static str, expected: SessionState) -> Result<()> {
        if self.state != expected {
            return Err(StrictPngError::invalid_state(operation, self.state));
        }
        Ok(())
    }

    fn fail(&mut self, err: StrictPngError) -> StrictPngError {
        debug!(from = ?self.state, error = %err, "decode session failed");
        self.state = SessionState::Failed;
        self.rows = None;
        self.first_idat = &[];
        err
    }

    /// Reads IHDR and every chunk up to the first IDAT.
    pub fn read_header(&mut self) -> Result<&ImageHeader> {
        self.expect_state("read_header", SessionState::Created)?;
        match self.read_header_chunks() {
            Ok(header) => {
                self.state = SessionState::HeaderRead;
                debug!(
                    width = header.width,
                    height = header.height,
                    color_type = ?header.color_type,
                    bit_depth = header.bit_depth.bits(),
                    interlaced = header.is_interlaced(),
                    "header read"
                );
                let header = self.header.insert(header);
                Ok(&*header)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    fn read_header_chunks(&mut self) -> Result<ImageHeader> {
        let ihdr = self
            .parser
            .next_chunk(&mut self.cursor)?
            .ok_or_else(|| StrictPngError::truncated(CHUNK_OVERHEAD, 0))?;
        let header = header::parse_header(&ihdr, &self.config)?;
        let rows_expected = RowIter::new(header.width, header.height, header.interlace).total_rows();

        loop {
            let Some(next) = self.parser.next_chunk(&mut self.cursor)? else {
                return Err(StrictPngError::missing_image_data(0, rows_expected));
            };
            match next.chunk_type {
                chunk::IDAT => {
                    if header.color_type == ColorType::Indexed && self.metadata.palette().is_none()
                    {
                        return Err(StrictPngError::invalid_format("indexed image without PLTE"));
                    }
                    self.first_idat = next.data;
                    self.rows_expected = rows_expected;
                    return Ok(header);
                }
                chunk::IHDR => return Err(StrictPngError::invalid_format("duplicate IHDR chunk")),
                chunk::IEND => return Err(StrictPngError::invalid_format("IEND before IDAT")),
                chunk::PLTE => self.metadata.set_palette(next.data, &header, &self.config)?,
                chunk::tRNS => {
                    self.metadata
                        .set_transparency(next.data, &header, &self.config)?;
                }
                other if other.is_critical() => {
                    return Err(StrictPngError::invalid_format(format!(
                        "unknown critical chunk {other}"
                    )))
                }
                _ => self.metadata.store_chunk(&next, &self.config)?,
            }
        }
    }

    /// Plans transforms and allocates the row buffers.
    pub fn begin_rows(&mut self) -> Result<&OutputInfo> {
        self.expect_state("begin_rows", SessionState::HeaderRead)?;
        match self.prepare_rows() {
            Ok((rows, output)) => {
                self.rows = Some(rows);
                self.state = SessionState::RowsReading;
                let output = self.output.insert(output);
                Ok(&*output)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    fn prepare_rows(&mut self) -> Result<(RowState<'a>, OutputInfo)> {
        let header = self
            .header
            .ok_or_else(|| StrictPngError::internal_panic("header missing after read_header"))?;
        let plan = TransformPlan::with_fit(
            self.config.transforms,
            &header,
            &self.metadata,
            self.config.transform_fit,
        )?;

        let overflow = || StrictPngError::invalid_format("row size overflows");
        let row_bytes = header.row_bytes().ok_or_else(overflow)?;
        let line_size = plan.output_row_bytes(header.width).ok_or_else(overflow)?;
        let out_format = plan.output_format();

        let rows = RowState {
            inflater: ZlibStream::new(),
            pending: self.first_idat,
            rows: RowIter::new(header.width, header.height, header.interlace),
            scanlines: ScanlineBuffer::new(row_bytes)?,
            plan,
            format: header.pixel_format(),
            out: Vec::with_capacity(line_size),
        };
        debug!(
            rows = self.rows_expected,
            passes = interlace::pass_count(header.interlace),
            line_size,
            applied = ?rows.plan.applied(),
            "rows begin"
        );
        let output = OutputInfo {
            width: header.width,
            height: header.height,
            color_type: out_format.color_type,
            bit_depth: out_format.bit_depth,
            line_size,
            interlaced: header.is_interlaced(),
            transforms: self.config.transforms,
        };
        Ok((rows, output))
    }

    /// Decodes the next stored row. `Ok(None)` once every pass is complete.
    pub fn read_row(&mut self) -> Result<Option<Row<'_>>> {
        self.expect_state("read_row", SessionState::RowsReading)?;
        let info = match self.next_row() {
            Ok(Some(info)) => info,
            Ok(None) => return Ok(None),
            Err(err) => return Err(self.fail(err)),
        };
        match &self.rows {
            Some(rs) => Ok(Some(Row {
                pass: info.pass,
                line: info.line,
                width: info.width,
                data: &rs.out,
            })),
            None => Err(StrictPngError::internal_panic("row state missing")),
        }
    }

    fn next_row(&mut self) -> Result<Option<RowInfo>> {
        let rows_read = self.rows_read;
        let rows_expected = self.rows_expected;
        let rs = self
            .rows
            .as_mut()
            .ok_or_else(|| StrictPngError::internal_panic("row state missing"))?;
        let Some(info) = rs.rows.next() else {
            return Ok(None);
        };

        let row_bytes = rs
            .format
            .row_bytes(info.width)
            .ok_or_else(|| StrictPngError::invalid_format("row size overflows"))?;
        if info.line == 0 {
            rs.scanlines.reset(row_bytes)?;
        }

        fill_scanline(&mut self.cursor, &mut self.parser, rs)
            .map_err(|err| match err {
                StrictPngError::MissingImageData { .. } => {
                    StrictPngError::missing_image_data(rows_read, rows_expected)
                }
                other => other,
            })?;

        rs.scanlines.unfilter_current(rs.format.filter_bpp(), info.line)?;
        let transformed = rs.plan.apply_row(rs.scanlines.current(), info.width);
        rs.out.clear();
        rs.out.extend_from_slice(transformed);
        rs.scanlines.advance();

        self.rows_read += 1;
        trace!(pass = info.pass, line = info.line, "row decoded");
        Ok(Some(info))
    }

    /// Consumes the rest of the stream after the last row: trailing IDAT
    /// chunks are skipped, ancillary chunks are kept as end metadata, and
    /// IEND must be present.
    pub fn finalize(&mut self) -> Result<&Metadata> {
        self.expect_state("finalize", SessionState::RowsReading)?;
        if self.rows_remaining() > 0 {
            return Err(StrictPngError::invalid_state("finalize", self.state));
        }
        self.rows = None;
        match self.read_trailer() {
            Ok(()) => {
                self.state = SessionState::Finalized;
                debug!(
                    end_chunks = self.metadata.end_chunks().len(),
                    crc_mismatches = self.crc_mismatches(),
                    "decode finalized"
                );
                Ok(&self.metadata)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    fn read_trailer(&mut self) -> Result<()> {
        let header = self
            .header
            .ok_or_else(|| StrictPngError::internal_panic("header missing at finalize"))?;
        let mut in_idat_run = true;
        loop {
            let Some(next) = self.parser.next_chunk(&mut self.cursor)? else {
                return Err(StrictPngError::missing_end());
            };
            match next.chunk_type {
                chunk::IDAT if in_idat_run => trace!(len = next.length(), "trailing IDAT skipped"),
                chunk::IEND => return Ok(()),
                chunk::IDAT | chunk::IHDR | chunk::PLTE => {
                    return Err(StrictPngError::invalid_format(format!(
                        "{} chunk after image data",
                        next.chunk_type
                    )))
                }
                other if other.is_critical() => {
                    return Err(StrictPngError::invalid_format(format!(
                        "unknown critical chunk {other}"
                    )))
                }
                _ => {
                    in_idat_run = false;
                    self.store_trailer_chunk(&next, &header)?;
                }
            }
        }
    }

    fn store_trailer_chunk(&mut self, chunk: &Chunk<'a>, header: &ImageHeader) -> Result<()> {
        // tRNS is only meaningful before the image data.
        if chunk.chunk_type == chunk::tRNS {
            debug!(color_type = ?header.color_type, "tRNS after image data ignored");
            return Ok(());
        }
        self.metadata.store_end_chunk(chunk, &self.config)
    }
}

// Inflates exactly one raw scanline (filter byte included) from the IDAT run,
// pulling further IDAT chunks as needed.
fn fill_scanline<'a>(
    cursor: &mut ByteCursor<'a>,
    parser: &mut ChunkParser,
    rs: &mut RowState<'a>,
) -> Result<()> {
    let raw = rs.scanlines.raw_mut();
    let mut filled = 0;
    while filled < raw.len() {
        let progress = rs.inflater.inflate(rs.pending, &mut raw[filled..])?;
        rs.pending = &rs.pending[progress.consumed..];
        filled += progress.produced;
        if filled == raw.len() {
            break;
        }
        if progress.stream_end {
            return Err(StrictPngError::missing_image_data(0, 0));
        }
        if progress.consumed == 0 && progress.produced == 0 {
            if !rs.pending.is_empty() {
                return Err(StrictPngError::corrupt_image_data(
                    "zlib stream made no progress",
                ));
            }
            match parser.next_chunk(cursor)? {
                Some(next) if next.chunk_type == chunk::IDAT => rs.pending = next.data,
                _ => return Err(StrictPngError::missing_image_data(0, 0)),
            }
        }
    }
    Ok(())
}

//! The byte-level TIFF collaborator.
//!
//! The container never touches bytes itself. Everything below the chunk
//! level (header, directory encoding, compression, file layout) goes through
//! an injected [`TiffCodec`]:
//!
//! - [`MemoryCodec`] keeps subfiles in memory (tests and in-process use)
//! - [`FileCodec`] persists classic TIFF or BigTIFF files via the `tiff` crate
//!
//! Chunks are addressed by the row-major index of the tile (or strip) within
//! its subfile, see [`crate::region::ChunkGrid`].

mod file;
mod memory;

pub use file::{FileCodec, DEFAULT_CHUNK_CACHE_CAPACITY};
pub use memory::MemoryCodec;

use serde::Serialize;

use crate::error::CodecError;
use crate::format::{SampleDepth, TagSet};
use crate::region::ChunkGrid;

// =============================================================================
// TiffVersion
// =============================================================================

/// TIFF flavour, identified by the version number in the file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum TiffVersion {
    /// Classic TIFF (version 42, 32-bit offsets)
    #[default]
    Classic,

    /// BigTIFF (version 43, 64-bit offsets)
    Big,
}

impl TiffVersion {
    pub fn from_u16(version: u16) -> Result<Self, CodecError> {
        match version {
            42 => Ok(TiffVersion::Classic),
            43 => Ok(TiffVersion::Big),
            other => Err(CodecError::InvalidVersion(other)),
        }
    }

    #[inline]
    pub const fn as_u16(self) -> u16 {
        match self {
            TiffVersion::Classic => 42,
            TiffVersion::Big => 43,
        }
    }
}

// =============================================================================
// ChunkData
// =============================================================================

/// Decoded samples of one tile or strip, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkData {
    U8(Vec<u8>),
    U16(Vec<u16>),
}

impl ChunkData {
    /// Zero-filled chunk of `len` samples.
    pub fn zeroed(depth: SampleDepth, len: usize) -> Self {
        match depth {
            SampleDepth::Eight => ChunkData::U8(vec![0; len]),
            SampleDepth::Sixteen => ChunkData::U16(vec![0; len]),
        }
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        match self {
            ChunkData::U8(s) => s.len(),
            ChunkData::U16(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Encoded size in bytes (uncompressed).
    pub fn byte_len(&self) -> usize {
        match self {
            ChunkData::U8(s) => s.len(),
            ChunkData::U16(s) => s.len() * 2,
        }
    }

    pub fn depth(&self) -> SampleDepth {
        match self {
            ChunkData::U8(_) => SampleDepth::Eight,
            ChunkData::U16(_) => SampleDepth::Sixteen,
        }
    }

    /// Keep the first `len` samples.
    pub(crate) fn truncate(&mut self, len: usize) {
        match self {
            ChunkData::U8(s) => s.truncate(len),
            ChunkData::U16(s) => s.truncate(len),
        }
    }
}

// =============================================================================
// TiffCodec
// =============================================================================

/// Byte-level TIFF operations the container delegates.
///
/// Reads address finalized subfiles by index. Writes go to a single pending
/// subfile: `begin_subfile`, then one `write_tile`/`write_strip` per chunk,
/// then `finalize_subfile` (or `discard_subfile`). A finalized subfile is
/// never rewritten.
///
/// Chunks handed to `write_*` are full size (`chunk_width * chunk_height`),
/// with padding past the image edge. Chunks returned by `read_*` may be
/// either full size or cropped to the part inside the image.
pub trait TiffCodec {
    /// Format version of the underlying file.
    fn version(&self) -> TiffVersion;

    /// Tags of every finalized subfile, in file order.
    fn directories(&mut self) -> Result<Vec<TagSet>, CodecError>;

    /// Decode one tile of a tiled subfile.
    fn read_tile(&mut self, subfile: usize, tile: u32) -> Result<ChunkData, CodecError>;

    /// Decode one strip of a strip-organized subfile.
    fn read_strip(&mut self, subfile: usize, strip: u32) -> Result<ChunkData, CodecError>;

    /// Open a new subfile for writing.
    fn begin_subfile(&mut self, tags: &TagSet) -> Result<(), CodecError>;

    fn write_tile(&mut self, tile: u32, data: ChunkData) -> Result<(), CodecError>;

    fn write_strip(&mut self, strip: u32, data: ChunkData) -> Result<(), CodecError>;

    /// Make the pending subfile part of the file.
    fn finalize_subfile(&mut self) -> Result<(), CodecError>;

    /// Drop the pending subfile, if any.
    fn discard_subfile(&mut self);

    /// Push everything finalized so far to durable storage.
    fn flush(&mut self) -> Result<(), CodecError>;
}

// =============================================================================
// Pending subfile bookkeeping shared by the codecs
// =============================================================================

/// Chunks collected for a subfile between `begin_subfile` and `finalize_subfile`.
#[derive(Debug)]
pub(crate) struct PendingChunks {
    tags: TagSet,
    grid: ChunkGrid,
    depth: SampleDepth,
    chunks: Vec<Option<ChunkData>>,
}

impl PendingChunks {
    pub(crate) fn new(tags: &TagSet) -> Result<Self, CodecError> {
        let depth = tags
            .sample_depth()
            .map_err(|e| CodecError::Unsupported(e.to_string()))?;
        let grid =
            ChunkGrid::for_tags(tags).map_err(|e| CodecError::Unsupported(e.to_string()))?;
        Ok(Self {
            tags: tags.clone(),
            grid,
            depth,
            chunks: vec![None; grid.chunk_count() as usize],
        })
    }

    pub(crate) fn grid(&self) -> &ChunkGrid {
        &self.grid
    }

    /// Store one chunk after checking it fits the pending subfile.
    pub(crate) fn put(&mut self, tiled: bool, index: u32, data: ChunkData) -> Result<(), CodecError> {
        if tiled != self.grid.is_tiled() {
            return Err(CodecError::ChunkMismatch(format!(
                "{} written to a {} subfile",
                if tiled { "tile" } else { "strip" },
                if self.grid.is_tiled() { "tiled" } else { "strip-organized" },
            )));
        }
        if data.depth() != self.depth {
            return Err(CodecError::ChunkMismatch(format!(
                "{}-bit chunk written to a {}-bit subfile",
                data.depth().bits(),
                self.depth.bits()
            )));
        }
        if data.len() != self.grid.chunk_len() {
            return Err(CodecError::ChunkMismatch(format!(
                "chunk {} holds {} samples, expected {}",
                index,
                data.len(),
                self.grid.chunk_len()
            )));
        }
        let count = self.grid.chunk_count();
        let slot = self.chunks.get_mut(index as usize).ok_or_else(|| {
            CodecError::ChunkMismatch(format!(
                "chunk {} outside a grid of {} chunks",
                index, count
            ))
        })?;
        *slot = Some(data);
        Ok(())
    }

    /// Tags and chunks in index order; every chunk must have been written.
    pub(crate) fn into_parts(self) -> Result<(TagSet, Vec<ChunkData>), CodecError> {
        let mut chunks = Vec::with_capacity(self.chunks.len());
        for (index, chunk) in self.chunks.into_iter().enumerate() {
            match chunk {
                Some(data) => chunks.push(data),
                None => {
                    return Err(CodecError::ChunkMismatch(format!(
                        "chunk {} was never written",
                        index
                    )))
                }
            }
        }
        Ok((self.tags, chunks))
    }
}

use tracing::debug;

use crate::error::CodecError;
use crate::format::TagSet;

use super::{ChunkData, PendingChunks, TiffCodec, TiffVersion};

/// A finalized subfile held in memory.
#[derive(Debug, Clone)]
struct StoredSubfile {
    tags: TagSet,
    chunks: Vec<ChunkData>,
}

/// In-memory codec.
///
/// Holds every finalized subfile as decoded chunks. Useful for tests and for
/// building images in-process before handing them to a [`super::FileCodec`].
#[derive(Debug, Default)]
pub struct MemoryCodec {
    version: TiffVersion,
    subfiles: Vec<StoredSubfile>,
    pending: Option<PendingChunks>,
    flushes: usize,
}

impl MemoryCodec {
    /// Empty classic-TIFF codec.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_version(version: TiffVersion) -> Self {
        Self {
            version,
            ..Self::default()
        }
    }

    /// Insert an already finalized subfile, as if it had been read from a file.
    ///
    /// No validation is done, so this can hold subfiles the container would
    /// refuse to write (other bit depths, compressed data, ...).
    pub fn push_subfile(&mut self, tags: TagSet, chunks: Vec<ChunkData>) {
        self.subfiles.push(StoredSubfile { tags, chunks });
    }

    /// Number of `flush` calls so far.
    pub fn flush_count(&self) -> usize {
        self.flushes
    }

    /// Whether a subfile is open for writing.
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    fn read_chunk(&self, subfile: usize, chunk: u32, tiled: bool) -> Result<ChunkData, CodecError> {
        let stored = self
            .subfiles
            .get(subfile)
            .ok_or(CodecError::NoSuchSubfile(subfile))?;
        if stored.tags.is_tiled() != tiled {
            return Err(CodecError::ChunkMismatch(format!(
                "subfile {} is not {}",
                subfile,
                if tiled { "tiled" } else { "strip-organized" }
            )));
        }
        stored
            .chunks
            .get(chunk as usize)
            .cloned()
            .ok_or(CodecError::NoSuchChunk { subfile, chunk })
    }

    fn pending_mut(&mut self) -> Result<&mut PendingChunks, CodecError> {
        self.pending.as_mut().ok_or(CodecError::NoPendingSubfile)
    }
}

impl TiffCodec for MemoryCodec {
    fn version(&self) -> TiffVersion {
        self.version
    }

    fn directories(&mut self) -> Result<Vec<TagSet>, CodecError> {
        Ok(self.subfiles.iter().map(|s| s.tags.clone()).collect())
    }

    fn read_tile(&mut self, subfile: usize, tile: u32) -> Result<ChunkData, CodecError> {
        self.read_chunk(subfile, tile, true)
    }

    fn read_strip(&mut self, subfile: usize, strip: u32) -> Result<ChunkData, CodecError> {
        self.read_chunk(subfile, strip, false)
    }

    fn begin_subfile(&mut self, tags: &TagSet) -> Result<(), CodecError> {
        if self.pending.is_some() {
            return Err(CodecError::PendingSubfile);
        }
        self.pending = Some(PendingChunks::new(tags)?);
        Ok(())
    }

    fn write_tile(&mut self, tile: u32, data: ChunkData) -> Result<(), CodecError> {
        self.pending_mut()?.put(true, tile, data)
    }

    fn write_strip(&mut self, strip: u32, data: ChunkData) -> Result<(), CodecError> {
        self.pending_mut()?.put(false, strip, data)
    }

    fn finalize_subfile(&mut self) -> Result<(), CodecError> {
        let pending = self.pending.take().ok_or(CodecError::NoPendingSubfile)?;
        let (tags, chunks) = pending.into_parts()?;
        debug!(
            subfile = self.subfiles.len(),
            width = tags.image_width,
            height = tags.image_height,
            chunks = chunks.len(),
            "Stored subfile in memory"
        );
        self.subfiles.push(StoredSubfile { tags, chunks });
        Ok(())
    }

    fn discard_subfile(&mut self) {
        self.pending = None;
    }

    fn flush(&mut self) -> Result<(), CodecError> {
        self.flushes += 1;
        Ok(())
    }
}

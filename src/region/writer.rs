use std::mem;

use tracing::debug;

use crate::codec::{ChunkData, TiffCodec};
use crate::error::TiffError;
use crate::format::{SampleDepth, TagSet};
use crate::raster::{Raster, Sample};

use super::grid::{copy_block, ChunkGrid, Rect};

/// A subfile that has been appended but not finalized.
///
/// Holds one zero-initialised, full-size buffer per chunk. Region writes
/// update the chunks they touch in place; nothing reaches the codec until
/// [`PendingSubfile::commit`]. Until then the subfile is invisible to reads.
#[derive(Debug)]
pub struct PendingSubfile {
    index: usize,
    tags: TagSet,
    grid: ChunkGrid,
    depth: SampleDepth,
    chunks: Vec<ChunkData>,
}

impl PendingSubfile {
    /// Pending subfile that will become subfile `index`.
    pub fn new(index: usize, tags: TagSet) -> Result<Self, TiffError> {
        tags.validate()?;
        let depth = tags.sample_depth()?;
        let grid = ChunkGrid::for_tags(&tags)?;
        let chunks = (0..grid.chunk_count())
            .map(|_| ChunkData::zeroed(depth, grid.chunk_len()))
            .collect();
        Ok(Self {
            index,
            tags,
            grid,
            depth,
            chunks,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    /// Copy `buffer` into the pending chunks at `rect`.
    ///
    /// `rect` must already be validated against the image; the buffer must
    /// be exactly `rect.height() x rect.width()`.
    pub fn write_region<T: Sample>(&mut self, buffer: &Raster<T>, rect: Rect) -> Result<(), TiffError> {
        if T::DEPTH != self.depth {
            return Err(TiffError::UnsupportedDepth {
                expected: self.depth.label(),
                found: T::DEPTH.bits(),
            });
        }
        if buffer.height() != rect.height() || buffer.width() != rect.width() {
            return Err(TiffError::BufferShape {
                expected_height: rect.height(),
                expected_width: rect.width(),
                actual_height: buffer.height(),
                actual_width: buffer.width(),
            });
        }

        let chunk_stride = self.grid.chunk_width() as usize;
        let buffer_stride = buffer.width() as usize;
        for span in self.grid.chunks_in(rect) {
            let slot = &mut self.chunks[span.index as usize];
            let mut samples = T::from_chunk(mem::replace(slot, ChunkData::U8(Vec::new())))?;

            let overlap = span.overlap;
            copy_block(
                buffer.as_slice(),
                buffer_stride,
                ((overlap.y1 - rect.y1) as usize, (overlap.x1 - rect.x1) as usize),
                &mut samples,
                chunk_stride,
                (
                    (overlap.y1 - span.origin_y) as usize,
                    (overlap.x1 - span.origin_x) as usize,
                ),
                overlap.height() as usize,
                overlap.width() as usize,
            );

            *slot = T::into_chunk(samples);
        }
        Ok(())
    }

    /// Hand every chunk to the codec and finalize the subfile.
    ///
    /// The codec must already have a pending subfile opened with these tags.
    /// Returns the tags to record in the directory.
    pub fn commit<C: TiffCodec + ?Sized>(self, codec: &mut C) -> Result<TagSet, TiffError> {
        let tiled = self.grid.is_tiled();
        let count = self.chunks.len();
        for (index, chunk) in self.chunks.into_iter().enumerate() {
            if tiled {
                codec.write_tile(index as u32, chunk)?;
            } else {
                codec.write_strip(index as u32, chunk)?;
            }
        }
        codec.finalize_subfile()?;

        debug!(
            subfile = self.index,
            width = self.tags.image_width,
            height = self.tags.image_height,
            tiled,
            chunks = count,
            "Finalized subfile"
        );
        Ok(self.tags)
    }
}

//! Chunk geometry of a subfile.
//!
//! Tiles and strips are handled the same way: a strip is a chunk as wide as
//! the image and `rows_per_strip` rows tall. Chunks are numbered row-major,
//! so the chunk at grid position `(row, col)` has index `row * across + col`.

use crate::error::TiffError;
use crate::format::{Layout, TagSet};

// =============================================================================
// Rect
// =============================================================================

/// A validated half-open pixel rectangle `[y1, y2) x [x1, x2)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub y1: u32,
    pub x1: u32,
    pub y2: u32,
    pub x2: u32,
}

impl Rect {
    pub fn new(y1: u32, x1: u32, y2: u32, x2: u32) -> Self {
        Self { y1, x1, y2, x2 }
    }

    /// Rectangle covering a whole `width x height` image.
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, height, width)
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.y2.saturating_sub(self.y1)
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.x2.saturating_sub(self.x1)
    }

    pub fn is_empty(&self) -> bool {
        self.height() == 0 || self.width() == 0
    }

    /// Overlap of two rectangles, `None` when they don't touch.
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let rect = Rect {
            y1: self.y1.max(other.y1),
            x1: self.x1.max(other.x1),
            y2: self.y2.min(other.y2),
            x2: self.x2.min(other.x2),
        };
        if rect.y1 < rect.y2 && rect.x1 < rect.x2 {
            Some(rect)
        } else {
            None
        }
    }
}

// =============================================================================
// ChunkGrid
// =============================================================================

/// One chunk touched by a rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpan {
    /// Row-major chunk index
    pub index: u32,

    /// Image row of the chunk's top edge
    pub origin_y: u32,

    /// Image column of the chunk's left edge
    pub origin_x: u32,

    /// Part of the rectangle inside this chunk, in image coordinates
    pub overlap: Rect,
}

/// The chunk layout of one subfile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkGrid {
    image_width: u32,
    image_height: u32,
    chunk_width: u32,
    chunk_height: u32,
    across: u32,
    down: u32,
    tiled: bool,
}

impl ChunkGrid {
    /// Grid for an image of the given size.
    ///
    /// Strip heights larger than the image (including
    /// [`crate::format::ROWS_PER_STRIP_MAX`]) collapse to a single strip.
    pub fn new(image_width: u32, image_height: u32, layout: Layout) -> Self {
        let (chunk_width, chunk_height, tiled) = match layout {
            Layout::Tiled {
                tile_width,
                tile_height,
            } => (tile_width, tile_height, true),
            Layout::Strips { rows_per_strip } => {
                (image_width, rows_per_strip.min(image_height).max(1), false)
            }
        };
        let across = if tiled {
            image_width.div_ceil(chunk_width)
        } else {
            1
        };
        let down = image_height.div_ceil(chunk_height);
        Self {
            image_width,
            image_height,
            chunk_width,
            chunk_height,
            across,
            down,
            tiled,
        }
    }

    /// Grid described by a subfile's tags.
    pub fn for_tags(tags: &TagSet) -> Result<Self, TiffError> {
        Ok(Self::new(tags.image_width, tags.image_height, tags.layout()?))
    }

    pub fn is_tiled(&self) -> bool {
        self.tiled
    }

    pub fn chunk_width(&self) -> u32 {
        self.chunk_width
    }

    pub fn chunk_height(&self) -> u32 {
        self.chunk_height
    }

    /// Chunks per grid row (always 1 for strips).
    pub fn across(&self) -> u32 {
        self.across
    }

    /// Chunks per grid column.
    pub fn down(&self) -> u32 {
        self.down
    }

    pub fn chunk_count(&self) -> u32 {
        self.across * self.down
    }

    /// Samples in a full (padded) chunk.
    pub fn chunk_len(&self) -> usize {
        self.chunk_width as usize * self.chunk_height as usize
    }

    /// Top-left image coordinate `(y, x)` of a chunk.
    pub fn chunk_origin(&self, index: u32) -> (u32, u32) {
        let row = index / self.across;
        let col = index % self.across;
        (row * self.chunk_height, col * self.chunk_width)
    }

    /// `(height, width)` of the part of a chunk that lies inside the image.
    ///
    /// Edge chunks are smaller than the nominal chunk size.
    pub fn chunk_data_dims(&self, index: u32) -> (u32, u32) {
        let (y, x) = self.chunk_origin(index);
        (
            self.chunk_height.min(self.image_height - y),
            self.chunk_width.min(self.image_width - x),
        )
    }

    /// Every chunk intersecting `rect`, row-major.
    pub fn chunks_in(&self, rect: Rect) -> impl Iterator<Item = ChunkSpan> + '_ {
        let (rows, cols) = if rect.is_empty() {
            (0..0, 0..0)
        } else {
            (
                rect.y1 / self.chunk_height..(rect.y2 - 1) / self.chunk_height + 1,
                rect.x1 / self.chunk_width..(rect.x2 - 1) / self.chunk_width + 1,
            )
        };
        rows.flat_map(move |row| {
            cols.clone().filter_map(move |col| {
                let origin_y = row * self.chunk_height;
                let origin_x = col * self.chunk_width;
                let chunk = Rect::new(
                    origin_y,
                    origin_x,
                    origin_y.saturating_add(self.chunk_height),
                    origin_x.saturating_add(self.chunk_width),
                );
                let overlap = chunk.intersect(&rect)?;
                Some(ChunkSpan {
                    index: row * self.across + col,
                    origin_y,
                    origin_x,
                    overlap,
                })
            })
        })
    }
}

/// Copy a `rows x cols` block between two row-major buffers.
#[allow(clippy::too_many_arguments)]
pub(crate) fn copy_block<T: Copy>(
    src: &[T],
    src_stride: usize,
    (src_y, src_x): (usize, usize),
    dst: &mut [T],
    dst_stride: usize,
    (dst_y, dst_x): (usize, usize),
    rows: usize,
    cols: usize,
) {
    for r in 0..rows {
        let s = (src_y + r) * src_stride + src_x;
        let d = (dst_y + r) * dst_stride + dst_x;
        dst[d..d + cols].copy_from_slice(&src[s..s + cols]);
    }
}

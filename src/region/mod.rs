//! Region-addressed access to a single subfile.
//!
//! A region is decomposed into the tiles (or strips) it intersects. Every
//! chunk is read from the codec in full and only the overlap is copied, so a
//! region may start and end anywhere inside a chunk.
//!
//! - [`reader`] - `read_region` over finalized subfiles
//! - [`writer`] - the pending subfile that `write_region` fills in
//! - [`grid`] - chunk geometry shared by both

pub mod grid;
pub mod reader;
pub mod writer;

pub use grid::{ChunkGrid, ChunkSpan, Rect};
pub use reader::{read_region, read_region_any};
pub use writer::PendingSubfile;

use crate::error::TiffError;

/// A requested rectangle `[y1, y2) x [x1, x2)` before validation.
///
/// Coordinates are signed so that negative requests can be reported as
/// [`TiffError::InvalidRegion`] rather than wrapping around.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub y1: i64,
    pub x1: i64,
    pub y2: i64,
    pub x2: i64,
}

impl Region {
    pub fn new(y1: i64, x1: i64, y2: i64, x2: i64) -> Self {
        Self { y1, x1, y2, x2 }
    }

    /// Check the region against a `width x height` image.
    ///
    /// Fails if a start coordinate is negative, an end coordinate exceeds the
    /// image, or the region is empty or inverted.
    pub fn validate(&self, width: u32, height: u32) -> Result<Rect, TiffError> {
        let valid = self.y1 >= 0
            && self.x1 >= 0
            && self.y2 <= height as i64
            && self.x2 <= width as i64
            && self.y1 < self.y2
            && self.x1 < self.x2;
        if !valid {
            return Err(TiffError::InvalidRegion {
                y1: self.y1,
                x1: self.x1,
                y2: self.y2,
                x2: self.x2,
                width,
                height,
            });
        }
        Ok(Rect::new(
            self.y1 as u32,
            self.x1 as u32,
            self.y2 as u32,
            self.x2 as u32,
        ))
    }
}

impl From<Rect> for Region {
    fn from(rect: Rect) -> Self {
        Self::new(
            rect.y1 as i64,
            rect.x1 as i64,
            rect.y2 as i64,
            rect.x2 as i64,
        )
    }
}

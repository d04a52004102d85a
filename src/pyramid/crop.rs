//! Bounding-box crops over a pyramid.
//!
//! [`PyramidCropEngine::crop`] reads from one explicitly chosen subfile.
//! [`PyramidCropEngine::multi_page_crop`] takes coordinates in the finest
//! level's frame, picks a level according to a [`CropStrategy`], rescales the
//! rectangle to that level and reads it there.

use tracing::info;

use crate::codec::TiffCodec;
use crate::error::TiffError;
use crate::format::{wrap_index, SubfileDirectory};
use crate::raster::{PixelBuffer, Raster, SampleValue};
use crate::region::{read_region_any, Rect, Region};

use super::levels::{PyramidLevel, PyramidLevels};

/// How `multi_page_crop` chooses a pyramid level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CropStrategy {
    /// The finest level on which the whole rectangle fits inside one tile,
    /// or the coarsest level if none does.
    #[default]
    FitPageTile,
}

/// Result of a crop: a single sample for a 1x1 request, a buffer otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Crop {
    Sample(SampleValue),
    Region(PixelBuffer),
}

impl Crop {
    /// The crop as a buffer; a single sample becomes a 1x1 buffer.
    pub fn into_buffer(self) -> PixelBuffer {
        match self {
            Crop::Region(buffer) => buffer,
            Crop::Sample(SampleValue::U8(v)) => {
                PixelBuffer::U8(Raster::from_fn(1, 1, |_, _| v))
            }
            Crop::Sample(SampleValue::U16(v)) => {
                PixelBuffer::U16(Raster::from_fn(1, 1, |_, _| v))
            }
        }
    }
}

/// Rescale a level-0 rectangle to a level `2^shift` times smaller.
///
/// Start coordinates round down and end coordinates round up, so the result
/// covers at least the requested area. The result is clipped to the level
/// and never empty.
pub fn rescale(rect: Rect, shift: u32, level_width: u32, level_height: u32) -> Rect {
    let divisor = 1u64 << shift;
    let scale_down = |v: u32| (v as u64 >> shift) as u32;
    let scale_up = |v: u32| (v as u64).div_ceil(divisor) as u32;

    let y1 = scale_down(rect.y1).min(level_height.saturating_sub(1));
    let x1 = scale_down(rect.x1).min(level_width.saturating_sub(1));
    let y2 = scale_up(rect.y2).min(level_height).max(y1 + 1);
    let x2 = scale_up(rect.x2).min(level_width).max(x1 + 1);
    Rect::new(y1, x1, y2, x2)
}

/// Level selection and composition for crop requests.
///
/// Borrows the container's directory and codec for the duration of a call.
pub struct PyramidCropEngine<'a, C: TiffCodec + ?Sized> {
    directory: &'a SubfileDirectory,
    codec: &'a mut C,
}

impl<'a, C: TiffCodec + ?Sized> PyramidCropEngine<'a, C> {
    pub fn new(directory: &'a SubfileDirectory, codec: &'a mut C) -> Self {
        Self { directory, codec }
    }

    /// Crop `region` from subfile `page` (negative values count from the end).
    ///
    /// Coordinates are in the page's own resolution.
    pub fn crop(&mut self, region: Region, page: isize) -> Result<Crop, TiffError> {
        let subfile = wrap_index(page, self.directory.len())?;
        let tags = self.directory.get(subfile)?;
        let rect = region.validate(tags.image_width, tags.image_height)?;

        let buffer = read_region_any(self.codec, subfile, tags, rect)?;
        if rect.height() == 1 && rect.width() == 1 {
            if let Some(sample) = buffer.sample(0, 0) {
                return Ok(Crop::Sample(sample));
            }
        }
        Ok(Crop::Region(buffer))
    }

    /// Crop `region`, given in level-0 pixels, from the level `strategy` picks.
    ///
    /// The returned buffer is in the chosen level's resolution.
    pub fn multi_page_crop(
        &mut self,
        region: Region,
        strategy: CropStrategy,
    ) -> Result<PixelBuffer, TiffError> {
        if self.directory.is_empty() {
            return Err(TiffError::EmptyDirectory);
        }
        let levels = PyramidLevels::from_directory(self.directory);
        let base = levels.base().ok_or_else(|| {
            TiffError::InvalidConfiguration("container holds no tiled pyramid levels".to_string())
        })?;
        let rect = region.validate(base.width, base.height)?;

        let level = self.select_level(&levels, rect, strategy)?;
        let scaled = rescale(rect, level.shift, level.width, level.height);
        info!(
            level = level.level_index,
            subfile = level.subfile,
            shift = level.shift,
            y1 = scaled.y1,
            x1 = scaled.x1,
            y2 = scaled.y2,
            x2 = scaled.x2,
            "Selected pyramid level for crop"
        );

        let tags = self.directory.get(level.subfile)?;
        read_region_any(self.codec, level.subfile, tags, scaled)
    }

    fn select_level<'l>(
        &self,
        levels: &'l PyramidLevels,
        rect: Rect,
        strategy: CropStrategy,
    ) -> Result<&'l PyramidLevel, TiffError> {
        let level = match strategy {
            CropStrategy::FitPageTile => levels.fit_page_tile(rect.height(), rect.width()),
        };
        level.ok_or_else(|| {
            TiffError::InvalidConfiguration("container holds no tiled pyramid levels".to_string())
        })
    }
}

//! Resolution pyramid construction.
//!
//! Level 0 is the base image, stored tiled. Each following level halves both
//! dimensions (rounding up) and is computed from the previous one:
//!
//! - every output pixel is the rounded integer mean `(sum + n / 2) / n` of
//!   its 2x2 source block
//! - blocks on the right and bottom edges are clamped to the pixels that
//!   exist (1 or 2 of them)
//!
//! The computation is pure integer arithmetic and bit-for-bit reproducible.
//! Building stops once `max_levels` levels exist or the last level is no
//! larger than `min_level_size` in both dimensions.

use std::ops::Range;

use tracing::{debug, info};

use crate::codec::TiffCodec;
use crate::container::TiffContainer;
use crate::error::TiffError;
use crate::format::{SubfileKind, TagSet, MAX_TILE_SIZE};
use crate::raster::{Raster, Sample};

// =============================================================================
// Configuration
// =============================================================================

/// Default tile edge length for pyramid levels.
pub const DEFAULT_TILE_SIZE: u32 = 512;

/// Default maximum number of levels, base included.
pub const DEFAULT_MAX_LEVELS: u32 = 5;

/// Default size at which halving stops.
pub const DEFAULT_MIN_LEVEL_SIZE: u32 = 1;

/// Pyramid shape parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PyramidConfig {
    /// Tile width and height of every level
    pub tile_size: u32,

    /// Maximum number of levels, base included
    pub max_levels: u32,

    /// Stop once a level is no larger than this in both dimensions
    pub min_level_size: u32,
}

impl Default for PyramidConfig {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            max_levels: DEFAULT_MAX_LEVELS,
            min_level_size: DEFAULT_MIN_LEVEL_SIZE,
        }
    }
}

impl PyramidConfig {
    /// Default configuration with the given tile size.
    pub fn with_tile_size(tile_size: u32) -> Self {
        Self {
            tile_size,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), TiffError> {
        if self.tile_size == 0 || self.tile_size > MAX_TILE_SIZE {
            return Err(TiffError::InvalidConfiguration(format!(
                "tile_size must be between 1 and {}, got {}",
                MAX_TILE_SIZE, self.tile_size
            )));
        }
        if self.max_levels == 0 {
            return Err(TiffError::InvalidConfiguration(
                "max_levels must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Down-sampling
// =============================================================================

/// Halve a raster: `ceil(w / 2) x ceil(h / 2)`, each pixel the rounded mean of
/// its (edge-clamped) 2x2 source block.
pub fn downsample<T: Sample>(src: &Raster<T>) -> Raster<T> {
    let (w, h) = (src.width(), src.height());
    let (nw, nh) = (w.div_ceil(2), h.div_ceil(2));

    Raster::from_fn(nw, nh, |y, x| {
        let (y0, x0) = (y * 2, x * 2);
        let (y1, x1) = ((y0 + 2).min(h), (x0 + 2).min(w));
        let mut sum = 0u32;
        let mut n = 0u32;
        for sy in y0..y1 {
            let row = src.row(sy);
            for sx in x0..x1 {
                sum += row[sx as usize].to_u32();
                n += 1;
            }
        }
        T::from_u32((sum + n / 2) / n)
    })
}

// =============================================================================
// PyramidBuilder
// =============================================================================

/// Writes a base image and its reduced levels into an empty container.
#[derive(Debug, Clone, Default)]
pub struct PyramidBuilder {
    config: PyramidConfig,
    template: Option<TagSet>,
}

impl PyramidBuilder {
    pub fn new(config: PyramidConfig) -> Self {
        Self {
            config,
            template: None,
        }
    }

    /// Take photometric, planar configuration, sample format, compression and
    /// subfile kind of level 0 from `tags` instead of the defaults.
    pub fn with_template(mut self, tags: TagSet) -> Self {
        self.template = Some(tags);
        self
    }

    pub fn config(&self) -> &PyramidConfig {
        &self.config
    }

    /// Tags for level `level` of size `width x height`.
    pub fn level_tags<T: Sample>(&self, level: usize, width: u32, height: u32) -> TagSet {
        let mut tags = match &self.template {
            Some(template) => template.clone(),
            None => TagSet::new(width, height, T::DEPTH),
        };
        tags.image_width = width;
        tags.image_height = height;
        tags.bits_per_sample = T::DEPTH.bits();
        tags.samples_per_pixel = 1;
        tags.tile_width = self.config.tile_size;
        tags.tile_height = self.config.tile_size;
        if level > 0 {
            tags.subfile_kind = SubfileKind::ReducedResolution;
            tags.page = None;
        }
        tags
    }

    /// Write the pyramid of `base` and return the range of subfiles created.
    ///
    /// Fails with [`TiffError::InvalidConfiguration`] if the configuration is
    /// invalid or the container already holds subfiles.
    pub fn build<T, C>(
        &self,
        container: &mut TiffContainer<C>,
        base: &Raster<T>,
    ) -> Result<Range<usize>, TiffError>
    where
        T: Sample,
        C: TiffCodec,
    {
        self.config.validate()?;
        if container.page_count() > 0 || container.has_pending_subfile() {
            return Err(TiffError::InvalidConfiguration(format!(
                "a pyramid must be built into an empty container, found {} subfile(s)",
                container.page_count()
            )));
        }

        let first = container.page_count();
        let tags = self.level_tags::<T>(0, base.width(), base.height());
        container.append_subfile(tags, base, true)?;
        debug!(level = 0, width = base.width(), height = base.height(), "Wrote pyramid level");

        let mut previous: Option<Raster<T>> = None;
        let mut count = 1;
        while count < self.config.max_levels {
            let src = previous.as_ref().unwrap_or(base);
            if src.width() <= self.config.min_level_size
                && src.height() <= self.config.min_level_size
            {
                break;
            }

            let level = downsample(src);
            let tags = self.level_tags::<T>(count as usize, level.width(), level.height());
            container.append_subfile(tags, &level, true)?;
            debug!(
                level = count,
                width = level.width(),
                height = level.height(),
                "Wrote pyramid level"
            );

            previous = Some(level);
            count += 1;
        }

        info!(
            levels = count,
            width = base.width(),
            height = base.height(),
            tile_size = self.config.tile_size,
            "Built pyramid"
        );
        Ok(first..first + count as usize)
    }
}

//! Pyramid level identification.
//!
//! Not every subfile in a container belongs to the image pyramid. Levels are
//! identified by:
//! 1. Being tiled (strip subfiles are never pyramid levels)
//! 2. Having dimensions equal to the largest tiled subfile divided by `2^k`,
//!    rounded either down or up
//!
//! The largest tiled subfile is level 0 (`k = 0`). When several subfiles
//! match the same `k`, the first one in file order wins.

use serde::Serialize;

use crate::format::{SubfileDirectory, TagSet};

/// Largest shift considered; `u32` dimensions cannot halve further.
const MAX_SHIFT: u32 = 31;

// =============================================================================
// PyramidLevel
// =============================================================================

/// One resolution level of the pyramid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PyramidLevel {
    /// Index of this level (0 = highest resolution)
    pub level_index: usize,

    /// Index of the subfile holding this level
    pub subfile: usize,

    /// Downsample shift: this level is level 0 divided by `2^shift`
    pub shift: u32,

    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,

    /// Number of tiles in X direction
    pub tiles_x: u32,

    /// Number of tiles in Y direction
    pub tiles_y: u32,
}

impl PyramidLevel {
    fn from_tags(tags: &TagSet, subfile: usize) -> Option<Self> {
        if !tags.is_tiled() {
            return None;
        }
        Some(Self {
            level_index: 0,
            subfile,
            shift: 0,
            width: tags.image_width,
            height: tags.image_height,
            tile_width: tags.tile_width,
            tile_height: tags.tile_height,
            tiles_x: tags.image_width.div_ceil(tags.tile_width),
            tiles_y: tags.image_height.div_ceil(tags.tile_height),
        })
    }

    /// Downsample factor relative to level 0.
    pub fn downsample(&self) -> u64 {
        1u64 << self.shift
    }

    /// Whether a `height x width` rectangle in level-0 pixels fits inside a
    /// single tile of this level.
    pub fn fits_in_tile(&self, height: u32, width: u32) -> bool {
        height as u64 <= (self.tile_height as u64) << self.shift
            && width as u64 <= (self.tile_width as u64) << self.shift
    }
}

// =============================================================================
// PyramidLevels
// =============================================================================

/// The pyramid levels of a container, finest first.
#[derive(Debug, Clone, Default)]
pub struct PyramidLevels {
    levels: Vec<PyramidLevel>,
}

impl PyramidLevels {
    /// Identify the pyramid levels among a directory's subfiles.
    pub fn from_directory(directory: &SubfileDirectory) -> Self {
        let mut candidates: Vec<PyramidLevel> = directory
            .iter()
            .enumerate()
            .filter_map(|(subfile, tags)| PyramidLevel::from_tags(tags, subfile))
            .collect();

        // Sort candidates by area (largest first = level 0); stable, so file
        // order breaks ties.
        candidates.sort_by(|a, b| {
            let area_a = a.width as u64 * a.height as u64;
            let area_b = b.width as u64 * b.height as u64;
            area_b.cmp(&area_a)
        });

        Self {
            levels: Self::filter_pyramid_levels(candidates),
        }
    }

    /// Keep candidates whose size matches a power-of-two reduction of the base.
    fn filter_pyramid_levels(candidates: Vec<PyramidLevel>) -> Vec<PyramidLevel> {
        let Some(base) = candidates.first() else {
            return candidates;
        };
        let (base_width, base_height) = (base.width, base.height);

        let mut levels: Vec<PyramidLevel> = Vec::new();
        for mut level in candidates {
            let Some(shift) = Self::matching_shift(base_width, base_height, &level) else {
                continue;
            };
            if levels.iter().any(|l| l.shift == shift) {
                continue;
            }
            level.shift = shift;
            levels.push(level);
        }

        levels.sort_by_key(|l| l.shift);
        for (index, level) in levels.iter_mut().enumerate() {
            level.level_index = index;
        }
        levels
    }

    /// The `k` for which `level` is `base / 2^k` in both dimensions.
    fn matching_shift(base_width: u32, base_height: u32, level: &PyramidLevel) -> Option<u32> {
        (0..=MAX_SHIFT).find(|&k| {
            Self::is_reduction(base_width, level.width, k)
                && Self::is_reduction(base_height, level.height, k)
        })
    }

    /// `size` is `base / 2^k` rounded down or up.
    fn is_reduction(base: u32, size: u32, k: u32) -> bool {
        let divisor = 1u64 << k;
        let floor = base as u64 / divisor;
        let ceil = (base as u64).div_ceil(divisor);
        size as u64 == floor || size as u64 == ceil
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PyramidLevel> {
        self.levels.iter()
    }

    pub fn get(&self, level: usize) -> Option<&PyramidLevel> {
        self.levels.get(level)
    }

    /// Highest resolution level.
    pub fn base(&self) -> Option<&PyramidLevel> {
        self.levels.first()
    }

    /// Lowest resolution level.
    pub fn coarsest(&self) -> Option<&PyramidLevel> {
        self.levels.last()
    }

    /// Finest level on which a `height x width` rectangle (level-0 pixels)
    /// fits inside one tile, falling back to the coarsest level.
    pub fn fit_page_tile(&self, height: u32, width: u32) -> Option<&PyramidLevel> {
        self.levels
            .iter()
            .find(|l| l.fits_in_tile(height, width))
            .or_else(|| self.coarsest())
    }
}

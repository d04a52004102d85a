//! Multi-resolution pyramids.
//!
//! - [`levels`] - which subfiles form the pyramid, and at what scale
//! - [`builder`] - writing a base image and its 2x reductions
//! - [`crop`] - reading a bounding box from the most suitable level

pub mod builder;
pub mod crop;
pub mod levels;

pub use builder::{
    downsample, PyramidBuilder, PyramidConfig, DEFAULT_MAX_LEVELS, DEFAULT_MIN_LEVEL_SIZE,
    DEFAULT_TILE_SIZE,
};
pub use crop::{rescale, Crop, CropStrategy, PyramidCropEngine};
pub use levels::{PyramidLevel, PyramidLevels};

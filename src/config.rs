//! Command-line configuration for the `pyramid-tiff` binary.
//!
//! Every option can also be set through an environment variable with the
//! `PTIFF_` prefix:
//!
//! - `PTIFF_SUBFILE` - Source subfile for `pyramid` (default: 0)
//! - `PTIFF_TILE_SIZE` - Pyramid tile size (default: 512)
//! - `PTIFF_MAX_LEVELS` - Maximum pyramid levels (default: 5)
//! - `PTIFF_MIN_LEVEL_SIZE` - Stop halving at this size (default: 1)
//! - `PTIFF_BIGTIFF` - Write BigTIFF output (default: false)
//! - `PTIFF_CACHE_CHUNKS` - Decoded chunks to keep cached (default: 256)

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::codec::{TiffVersion, DEFAULT_CHUNK_CACHE_CAPACITY};
use crate::format::MAX_TILE_SIZE;
use crate::pyramid::{
    PyramidConfig, DEFAULT_MAX_LEVELS, DEFAULT_MIN_LEVEL_SIZE, DEFAULT_TILE_SIZE,
};
use crate::region::Region;

// =============================================================================
// Default Values
// =============================================================================

/// Default source subfile for pyramid builds.
pub const DEFAULT_SOURCE_SUBFILE: isize = 0;

// =============================================================================
// CLI Arguments
// =============================================================================

/// pyramid-tiff - Region access to pyramidal TIFF images.
#[derive(Parser, Debug, Clone)]
#[command(name = "pyramid-tiff")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the subfile directory and pyramid levels of a TIFF file.
    Info(InfoConfig),

    /// Build a tiled pyramid from one subfile of a TIFF file.
    Pyramid(BuildConfig),

    /// Crop a rectangle and save it as a PNG.
    Crop(CropConfig),
}

/// Options for `info`.
#[derive(Args, Debug, Clone)]
pub struct InfoConfig {
    /// TIFF file to inspect.
    pub path: PathBuf,

    /// Print JSON instead of a table.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

/// Options for `pyramid`.
#[derive(Args, Debug, Clone)]
pub struct BuildConfig {
    /// Source TIFF file.
    pub input: PathBuf,

    /// Destination file; must not exist or hold no subfiles.
    pub output: PathBuf,

    /// Source subfile (negative values count from the end).
    #[arg(long, default_value_t = DEFAULT_SOURCE_SUBFILE, env = "PTIFF_SUBFILE", allow_negative_numbers = true)]
    pub subfile: isize,

    /// Tile width and height of every level.
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE, env = "PTIFF_TILE_SIZE")]
    pub tile_size: u32,

    /// Maximum number of levels, base included.
    #[arg(long, default_value_t = DEFAULT_MAX_LEVELS, env = "PTIFF_MAX_LEVELS")]
    pub max_levels: u32,

    /// Stop once a level is no larger than this in both dimensions.
    #[arg(long, default_value_t = DEFAULT_MIN_LEVEL_SIZE, env = "PTIFF_MIN_LEVEL_SIZE")]
    pub min_level_size: u32,

    /// Write BigTIFF instead of classic TIFF.
    #[arg(long, default_value_t = false, env = "PTIFF_BIGTIFF")]
    pub bigtiff: bool,

    /// Maximum number of decoded chunks to cache while reading the source.
    #[arg(long, default_value_t = DEFAULT_CHUNK_CACHE_CAPACITY, env = "PTIFF_CACHE_CHUNKS")]
    pub cache_chunks: usize,
}

/// Options for `crop`.
#[derive(Args, Debug, Clone)]
pub struct CropConfig {
    /// TIFF file to crop from.
    pub path: PathBuf,

    /// Top edge (inclusive).
    #[arg(allow_negative_numbers = true)]
    pub y1: i64,

    /// Left edge (inclusive).
    #[arg(allow_negative_numbers = true)]
    pub x1: i64,

    /// Bottom edge (exclusive).
    #[arg(allow_negative_numbers = true)]
    pub y2: i64,

    /// Right edge (exclusive).
    #[arg(allow_negative_numbers = true)]
    pub x2: i64,

    /// PNG file to write.
    #[arg(short, long)]
    pub output: PathBuf,

    /// Crop from this subfile in its own resolution instead of choosing a
    /// pyramid level; coordinates are then in that subfile's pixels.
    #[arg(long, allow_negative_numbers = true)]
    pub page: Option<isize>,

    /// Maximum number of decoded chunks to cache.
    #[arg(long, default_value_t = DEFAULT_CHUNK_CACHE_CAPACITY, env = "PTIFF_CACHE_CHUNKS")]
    pub cache_chunks: usize,
}

// =============================================================================
// Validation
// =============================================================================

impl BuildConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.input == self.output {
            return Err("input and output must be different files".to_string());
        }
        if self.tile_size == 0 || self.tile_size > MAX_TILE_SIZE {
            return Err(format!("tile_size must be between 1 and {}", MAX_TILE_SIZE));
        }
        if self.max_levels == 0 {
            return Err("max_levels must be greater than 0".to_string());
        }
        if self.cache_chunks == 0 {
            return Err("cache_chunks must be greater than 0".to_string());
        }
        Ok(())
    }

    pub fn pyramid_config(&self) -> PyramidConfig {
        PyramidConfig {
            tile_size: self.tile_size,
            max_levels: self.max_levels,
            min_level_size: self.min_level_size,
        }
    }

    pub fn version(&self) -> TiffVersion {
        if self.bigtiff {
            TiffVersion::Big
        } else {
            TiffVersion::Classic
        }
    }
}

impl CropConfig {
    /// Validate the configuration and return an error message if invalid.
    ///
    /// Bounds against the image are checked when the file is opened.
    pub fn validate(&self) -> Result<(), String> {
        if self.y1 >= self.y2 || self.x1 >= self.x2 {
            return Err(format!(
                "empty crop rectangle ({}, {}) - ({}, {})",
                self.y1, self.x1, self.y2, self.x2
            ));
        }
        let is_png = self
            .output
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("png"))
            .unwrap_or(false);
        if !is_png {
            return Err("output must be a .png file".to_string());
        }
        if self.cache_chunks == 0 {
            return Err("cache_chunks must be greater than 0".to_string());
        }
        Ok(())
    }

    pub fn region(&self) -> Region {
        Region::new(self.y1, self.x1, self.y2, self.x2)
    }
}

// =============================================================================
// Tests
// =============================================================================

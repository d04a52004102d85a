//! # pyramid-tiff
//!
//! Region-level read/write access to pyramidal (multi-resolution) TIFF images.
//!
//! A TIFF file is treated as an ordered list of subfiles, each a single-channel
//! 8 or 16 bit raster stored either as tiles or as strips. On top of that this
//! crate provides:
//!
//! - **Region I/O**: read or write any rectangle of a subfile; only the tiles
//!   or strips it touches are decoded
//! - **Pyramid building**: write a base image plus successive 2x reductions,
//!   all tiled
//! - **Pyramid cropping**: read a rectangle given in full-resolution
//!   coordinates from the coarsest level that still fits it in one tile
//!
//! ## Architecture
//!
//! - [`container`] - [`TiffContainer`], the façade over everything below
//! - [`region`] - region validation, chunk geometry, region read/write
//! - [`pyramid`] - level identification, pyramid builder, crop engine
//! - [`mod@format`] - subfile tags and the subfile directory
//! - [`codec`] - the [`TiffCodec`] seam with file and in-memory codecs
//! - [`raster`] - typed sample buffers
//! - [`config`] - CLI configuration for the `pyramid-tiff` binary
//!
//! ## Example
//!
//! ```rust,no_run
//! use pyramid_tiff::{Raster, Region, TiffContainer, TiffVersion};
//!
//! # fn main() -> Result<(), pyramid_tiff::TiffError> {
//! let base = Raster::from_fn(2048, 2048, |y, x| ((x + y) % 256) as u8);
//!
//! let mut container = TiffContainer::open("slide.tif", TiffVersion::Classic)?;
//! container.build_pyramid(&base, 512)?;
//!
//! let crop = container.read_region::<u8>(0, Region::new(100, 100, 300, 400))?;
//! assert_eq!((crop.height(), crop.width()), (200, 300));
//! container.close()?;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod container;
pub mod error;
pub mod format;
pub mod pyramid;
pub mod raster;
pub mod region;

// Re-export commonly used types
pub use codec::{ChunkData, FileCodec, MemoryCodec, TiffCodec, TiffVersion};
pub use container::TiffContainer;
pub use error::{CodecError, TiffError};
pub use format::{
    wrap_index, Layout, PageNumber, SampleDepth, SubfileDirectory, SubfileKind, TagSet,
    COMPRESSION_NONE, MAX_TILE_SIZE, PHOTOMETRIC_MIN_IS_BLACK, PLANAR_CONFIG_CONTIG,
    ROWS_PER_STRIP_MAX, SAMPLE_FORMAT_UINT,
};
pub use pyramid::{
    downsample, Crop, CropStrategy, PyramidBuilder, PyramidConfig, PyramidCropEngine,
    PyramidLevel, PyramidLevels,
};
pub use raster::{PixelBuffer, Raster, Sample, SampleValue};
pub use region::{ChunkGrid, Rect, Region};

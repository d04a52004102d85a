//! The subfile data model.
//!
//! - [`tags`] - per-subfile [`TagSet`] and the interpreted tag enums
//! - [`directory`] - the ordered [`SubfileDirectory`] and index wrapping

pub mod directory;
pub mod tags;

pub use directory::{wrap_index, SubfileDirectory};
pub use tags::{
    Layout, PageNumber, SampleDepth, SubfileKind, TagSet, COMPRESSION_NONE, MAX_TILE_SIZE,
    PHOTOMETRIC_MIN_IS_BLACK, PLANAR_CONFIG_CONTIG, ROWS_PER_STRIP_MAX, SAMPLE_FORMAT_UINT,
};

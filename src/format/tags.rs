//! Per-subfile tag record and the interpreted tag enums.
//!
//! A [`TagSet`] describes one subfile: its geometry, sample depth and how its
//! pixels are split into chunks (tiles or strips). Interpreted values
//! ([`SubfileKind`], [`SampleDepth`], [`Layout`]) are closed enums; values the
//! container only passes through to the codec (compression, photometric,
//! planar configuration, sample format) stay raw `u16`.

use serde::Serialize;

use crate::error::TiffError;

// =============================================================================
// Constants
// =============================================================================

/// RowsPerStrip value meaning "one strip spans the whole image".
pub const ROWS_PER_STRIP_MAX: u32 = u32::MAX;

/// Compression tag value for uncompressed data.
pub const COMPRESSION_NONE: u16 = 1;

/// Photometric interpretation "BlackIsZero".
pub const PHOTOMETRIC_MIN_IS_BLACK: u16 = 1;

/// Planar configuration "chunky" (contiguous samples).
pub const PLANAR_CONFIG_CONTIG: u16 = 1;

/// Sample format "unsigned integer".
pub const SAMPLE_FORMAT_UINT: u16 = 1;

/// Largest tile edge accepted for writing.
pub const MAX_TILE_SIZE: u32 = 16384;

// =============================================================================
// SubfileKind
// =============================================================================

/// Interpretation of the NewSubfileType bit field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubfileKind {
    /// No bits set (a full-resolution image).
    Undefined,

    /// Bit 0: reduced-resolution version of another subfile.
    ReducedResolution,

    /// Bit 1: one page of a multi-page image.
    Page,
}

impl SubfileKind {
    /// Interpret a raw NewSubfileType value.
    ///
    /// The reduced-resolution bit takes precedence when both are set. Bits
    /// beyond the first two (transparency mask and friends) are ignored.
    pub fn from_bits(bits: u32) -> Self {
        if bits & 0b01 != 0 {
            SubfileKind::ReducedResolution
        } else if bits & 0b10 != 0 {
            SubfileKind::Page
        } else {
            SubfileKind::Undefined
        }
    }

    /// Raw NewSubfileType value.
    #[inline]
    pub const fn to_bits(self) -> u32 {
        match self {
            SubfileKind::Undefined => 0,
            SubfileKind::ReducedResolution => 1,
            SubfileKind::Page => 2,
        }
    }
}

// =============================================================================
// SampleDepth
// =============================================================================

/// The sample depths region I/O can handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SampleDepth {
    Eight,
    Sixteen,
}

impl SampleDepth {
    /// Interpret a BitsPerSample value.
    pub fn from_bits(bits: u16) -> Option<Self> {
        match bits {
            8 => Some(SampleDepth::Eight),
            16 => Some(SampleDepth::Sixteen),
            _ => None,
        }
    }

    #[inline]
    pub const fn bits(self) -> u16 {
        match self {
            SampleDepth::Eight => 8,
            SampleDepth::Sixteen => 16,
        }
    }

    /// Bit count as text, for error messages.
    #[inline]
    pub const fn label(self) -> &'static str {
        match self {
            SampleDepth::Eight => "8",
            SampleDepth::Sixteen => "16",
        }
    }

    /// Largest sample value at this depth.
    #[inline]
    pub const fn max_value(self) -> u16 {
        match self {
            SampleDepth::Eight => u8::MAX as u16,
            SampleDepth::Sixteen => u16::MAX,
        }
    }
}

// =============================================================================
// Layout
// =============================================================================

/// How a subfile's pixels are split into independently stored chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    /// Fixed-size tiles laid out row-major across the image.
    Tiled { tile_width: u32, tile_height: u32 },

    /// Full-width strips of `rows_per_strip` rows (the last one may be shorter).
    Strips { rows_per_strip: u32 },
}

impl Layout {
    pub fn is_tiled(self) -> bool {
        matches!(self, Layout::Tiled { .. })
    }
}

// =============================================================================
// PageNumber
// =============================================================================

/// The PageNumber tag: this page's number and the total page count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageNumber {
    pub number: u16,
    pub count: u16,
}

// =============================================================================
// TagSet
// =============================================================================

/// Metadata for one subfile.
///
/// Fixed once the subfile is finalized. A finalized subfile is either tiled
/// (both tile dimensions non-zero) or strip organized (both zero).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagSet {
    pub subfile_kind: SubfileKind,
    pub image_width: u32,
    pub image_height: u32,
    pub bits_per_sample: u16,
    pub samples_per_pixel: u16,
    pub compression: u16,
    pub photometric: u16,
    pub planar_config: u16,
    pub sample_format: u16,

    /// Strip height; [`ROWS_PER_STRIP_MAX`] for a single strip.
    pub rows_per_strip: u32,

    /// 0 for strip layout.
    pub tile_width: u32,

    /// 0 for strip layout.
    pub tile_height: u32,

    pub min_sample_value: u16,
    pub max_sample_value: u16,
    pub page: Option<PageNumber>,
}

impl TagSet {
    /// Tags for an uncompressed single-sample grayscale image stored as one strip.
    pub fn new(image_width: u32, image_height: u32, depth: SampleDepth) -> Self {
        Self {
            subfile_kind: SubfileKind::Undefined,
            image_width,
            image_height,
            bits_per_sample: depth.bits(),
            samples_per_pixel: 1,
            compression: COMPRESSION_NONE,
            photometric: PHOTOMETRIC_MIN_IS_BLACK,
            planar_config: PLANAR_CONFIG_CONTIG,
            sample_format: SAMPLE_FORMAT_UINT,
            rows_per_strip: ROWS_PER_STRIP_MAX,
            tile_width: 0,
            tile_height: 0,
            min_sample_value: 0,
            max_sample_value: depth.max_value(),
            page: None,
        }
    }

    /// Switch to a tiled layout.
    pub fn with_tiles(mut self, tile_width: u32, tile_height: u32) -> Self {
        self.tile_width = tile_width;
        self.tile_height = tile_height;
        self
    }

    /// Switch to a strip layout with the given strip height.
    pub fn with_rows_per_strip(mut self, rows_per_strip: u32) -> Self {
        self.tile_width = 0;
        self.tile_height = 0;
        self.rows_per_strip = rows_per_strip;
        self
    }

    pub fn with_kind(mut self, kind: SubfileKind) -> Self {
        self.subfile_kind = kind;
        self
    }

    pub fn with_page(mut self, number: u16, count: u16) -> Self {
        self.page = Some(PageNumber { number, count });
        self
    }

    /// The sample depth, if it is one region I/O supports.
    pub fn sample_depth(&self) -> Result<SampleDepth, TiffError> {
        SampleDepth::from_bits(self.bits_per_sample).ok_or(TiffError::UnsupportedDepth {
            expected: "8 or 16",
            found: self.bits_per_sample,
        })
    }

    /// Classify the storage layout.
    ///
    /// A half-set tile pair or a zero strip height is rejected.
    pub fn layout(&self) -> Result<Layout, TiffError> {
        match (self.tile_width, self.tile_height) {
            (0, 0) if self.rows_per_strip == 0 => Err(TiffError::InvalidConfiguration(
                "rows_per_strip must be positive".to_string(),
            )),
            (0, 0) => Ok(Layout::Strips {
                rows_per_strip: self.rows_per_strip,
            }),
            (tile_width, tile_height) if tile_width > 0 && tile_height > 0 => Ok(Layout::Tiled {
                tile_width,
                tile_height,
            }),
            (tile_width, tile_height) => Err(TiffError::InvalidConfiguration(format!(
                "tile dimensions must both be set or both be zero, got {}x{}",
                tile_width, tile_height
            ))),
        }
    }

    #[inline]
    pub fn is_tiled(&self) -> bool {
        self.tile_width > 0 && self.tile_height > 0
    }

    /// Pixel count, used to order pyramid levels.
    #[inline]
    pub fn area(&self) -> u64 {
        self.image_width as u64 * self.image_height as u64
    }

    /// Check everything region I/O relies on before a subfile is written.
    pub fn validate(&self) -> Result<(), TiffError> {
        if self.image_width == 0 || self.image_height == 0 {
            return Err(TiffError::InvalidConfiguration(format!(
                "image dimensions must be positive, got {}x{}",
                self.image_width, self.image_height
            )));
        }
        if self.samples_per_pixel != 1 {
            return Err(TiffError::InvalidConfiguration(format!(
                "only single-sample images are supported, got {} samples per pixel",
                self.samples_per_pixel
            )));
        }
        self.sample_depth()?;
        if let Layout::Tiled {
            tile_width,
            tile_height,
        } = self.layout()?
        {
            if tile_width > MAX_TILE_SIZE || tile_height > MAX_TILE_SIZE {
                return Err(TiffError::InvalidConfiguration(format!(
                    "tile dimensions must not exceed {}, got {}x{}",
                    MAX_TILE_SIZE, tile_width, tile_height
                )));
            }
        }
        Ok(())
    }
}

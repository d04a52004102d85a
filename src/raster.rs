//! Pixel buffers exchanged with callers.
//!
//! A [`Raster`] is a dense row-major grid of single-channel samples with an
//! explicit height and width. Only `u8` and `u16` samples exist; the
//! [`Sample`] trait ties each Rust type to its TIFF sample depth so that the
//! region reader and writer can dispatch on `bits_per_sample` at runtime while
//! callers keep a statically typed buffer.
//!
//! [`PixelBuffer`] is the depth-erased form used where the depth is only known
//! from the file (the CLI, `read_region_any`, `multi_page_crop`).

use std::fmt::Debug;

use serde::Serialize;

use crate::codec::ChunkData;
use crate::error::TiffError;
use crate::format::SampleDepth;

// =============================================================================
// Sample
// =============================================================================

/// An unsigned sample type supported by the container (`u8` or `u16`).
pub trait Sample: Copy + Default + Ord + Debug + Send + Sync + 'static {
    /// TIFF depth this type is stored at.
    const DEPTH: SampleDepth;

    /// Largest representable value.
    const MAX: Self;

    /// Widen to `u32` for arithmetic.
    fn to_u32(self) -> u32;

    /// Narrow from `u32`, saturating at [`Sample::MAX`].
    fn from_u32(value: u32) -> Self;

    /// Widen to `u16` for the Min/MaxSampleValue tags.
    fn to_u16(self) -> u16;

    /// Wrap a typed raster in the depth-erased buffer.
    fn into_buffer(raster: Raster<Self>) -> PixelBuffer;

    /// Unwrap a depth-erased buffer, failing when the depth differs.
    fn from_buffer(buffer: PixelBuffer) -> Result<Raster<Self>, TiffError>;

    /// Wrap chunk samples for the codec.
    fn into_chunk(samples: Vec<Self>) -> ChunkData;

    /// Unwrap chunk samples coming from the codec.
    fn from_chunk(chunk: ChunkData) -> Result<Vec<Self>, TiffError>;
}

impl Sample for u8 {
    const DEPTH: SampleDepth = SampleDepth::Eight;
    const MAX: Self = u8::MAX;

    #[inline]
    fn to_u32(self) -> u32 {
        self as u32
    }

    #[inline]
    fn from_u32(value: u32) -> Self {
        value.min(u8::MAX as u32) as u8
    }

    #[inline]
    fn to_u16(self) -> u16 {
        self as u16
    }

    fn into_buffer(raster: Raster<Self>) -> PixelBuffer {
        PixelBuffer::U8(raster)
    }

    fn from_buffer(buffer: PixelBuffer) -> Result<Raster<Self>, TiffError> {
        match buffer {
            PixelBuffer::U8(raster) => Ok(raster),
            PixelBuffer::U16(_) => Err(TiffError::UnsupportedDepth {
                expected: "8",
                found: 16,
            }),
        }
    }

    fn into_chunk(samples: Vec<Self>) -> ChunkData {
        ChunkData::U8(samples)
    }

    fn from_chunk(chunk: ChunkData) -> Result<Vec<Self>, TiffError> {
        match chunk {
            ChunkData::U8(samples) => Ok(samples),
            ChunkData::U16(_) => Err(TiffError::UnsupportedDepth {
                expected: "8",
                found: 16,
            }),
        }
    }
}

impl Sample for u16 {
    const DEPTH: SampleDepth = SampleDepth::Sixteen;
    const MAX: Self = u16::MAX;

    #[inline]
    fn to_u32(self) -> u32 {
        self as u32
    }

    #[inline]
    fn from_u32(value: u32) -> Self {
        value.min(u16::MAX as u32) as u16
    }

    #[inline]
    fn to_u16(self) -> u16 {
        self
    }

    fn into_buffer(raster: Raster<Self>) -> PixelBuffer {
        PixelBuffer::U16(raster)
    }

    fn from_buffer(buffer: PixelBuffer) -> Result<Raster<Self>, TiffError> {
        match buffer {
            PixelBuffer::U16(raster) => Ok(raster),
            PixelBuffer::U8(_) => Err(TiffError::UnsupportedDepth {
                expected: "16",
                found: 8,
            }),
        }
    }

    fn into_chunk(samples: Vec<Self>) -> ChunkData {
        ChunkData::U16(samples)
    }

    fn from_chunk(chunk: ChunkData) -> Result<Vec<Self>, TiffError> {
        match chunk {
            ChunkData::U16(samples) => Ok(samples),
            ChunkData::U8(_) => Err(TiffError::UnsupportedDepth {
                expected: "16",
                found: 8,
            }),
        }
    }
}

// =============================================================================
// Raster
// =============================================================================

/// A dense row-major grid of samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster<T> {
    width: u32,
    height: u32,
    data: Vec<T>,
}

impl<T: Sample> Raster<T> {
    /// Create a zero-filled raster.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![T::default(); width as usize * height as usize],
        }
    }

    /// Wrap existing row-major samples.
    ///
    /// Fails with [`TiffError::BufferShape`] if `data.len() != width * height`.
    pub fn from_vec(width: u32, height: u32, data: Vec<T>) -> Result<Self, TiffError> {
        if data.len() != width as usize * height as usize {
            let actual_width = if height == 0 {
                0
            } else {
                (data.len() / height as usize) as u32
            };
            return Err(TiffError::BufferShape {
                expected_height: height,
                expected_width: width,
                actual_height: height,
                actual_width,
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Build a raster by evaluating `f(y, x)` for every pixel.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> T) -> Self {
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(f(y, x));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row-major samples.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Sample at `(y, x)`, or `None` outside the raster.
    pub fn get(&self, y: u32, x: u32) -> Option<T> {
        if y >= self.height || x >= self.width {
            return None;
        }
        Some(self.data[y as usize * self.width as usize + x as usize])
    }

    /// One row of samples.
    ///
    /// # Panics
    /// Panics if `y >= height`.
    pub fn row(&self, y: u32) -> &[T] {
        let start = y as usize * self.width as usize;
        &self.data[start..start + self.width as usize]
    }

    /// Copy out the window `[y1, y2) x [x1, x2)`; the window is clipped to the raster.
    pub fn window(&self, y1: u32, x1: u32, y2: u32, x2: u32) -> Raster<T> {
        let y2 = y2.min(self.height);
        let x2 = x2.min(self.width);
        let y1 = y1.min(y2);
        let x1 = x1.min(x2);
        let height = y2.saturating_sub(y1);
        let width = x2.saturating_sub(x1);
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for y in y1..y1 + height {
            let row = self.row(y);
            data.extend_from_slice(&row[x1 as usize..(x1 + width) as usize]);
        }
        Raster {
            width,
            height,
            data,
        }
    }

    /// Smallest and largest sample, `None` for an empty raster.
    pub fn min_max(&self) -> Option<(T, T)> {
        let first = *self.data.first()?;
        Some(
            self.data
                .iter()
                .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v))),
        )
    }
}

// =============================================================================
// Depth-erased buffers
// =============================================================================

/// A raster whose sample depth is only known at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PixelBuffer {
    U8(Raster<u8>),
    U16(Raster<u16>),
}

impl PixelBuffer {
    pub fn width(&self) -> u32 {
        match self {
            PixelBuffer::U8(r) => r.width(),
            PixelBuffer::U16(r) => r.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            PixelBuffer::U8(r) => r.height(),
            PixelBuffer::U16(r) => r.height(),
        }
    }

    pub fn depth(&self) -> SampleDepth {
        match self {
            PixelBuffer::U8(_) => SampleDepth::Eight,
            PixelBuffer::U16(_) => SampleDepth::Sixteen,
        }
    }

    /// Sample at `(y, x)`, or `None` outside the buffer.
    pub fn sample(&self, y: u32, x: u32) -> Option<SampleValue> {
        match self {
            PixelBuffer::U8(r) => r.get(y, x).map(SampleValue::U8),
            PixelBuffer::U16(r) => r.get(y, x).map(SampleValue::U16),
        }
    }

    /// Unwrap as a typed raster.
    pub fn into_raster<T: Sample>(self) -> Result<Raster<T>, TiffError> {
        T::from_buffer(self)
    }
}

impl From<Raster<u8>> for PixelBuffer {
    fn from(raster: Raster<u8>) -> Self {
        PixelBuffer::U8(raster)
    }
}

impl From<Raster<u16>> for PixelBuffer {
    fn from(raster: Raster<u16>) -> Self {
        PixelBuffer::U16(raster)
    }
}

/// A single sample whose depth is only known at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SampleValue {
    U8(u8),
    U16(u16),
}

impl SampleValue {
    pub fn as_u32(self) -> u32 {
        match self {
            SampleValue::U8(v) => v as u32,
            SampleValue::U16(v) => v as u32,
        }
    }
}

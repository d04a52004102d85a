//! Test utilities for integration tests.
//!
//! Fixture images and helpers for writing TIFF files the way other tools
//! would, so the reader is exercised on layouts this crate never produces.

use std::fs::File;
use std::path::Path;

use tiff::encoder::colortype::{Gray16, Gray8};
use tiff::encoder::compression::Lzw;
use tiff::encoder::TiffEncoder;

use pyramid_tiff::{MemoryCodec, Raster, Sample, TiffContainer};

// =============================================================================
// Fixture images
// =============================================================================

/// Horizontal ramp from 0 at the left edge to `T::MAX` at the right edge.
pub fn ramp<T: Sample>(width: u32, height: u32) -> Raster<T> {
    let max = T::MAX.to_u32() as u64;
    let span = (width.max(2) - 1) as u64;
    Raster::from_fn(width, height, |_, x| T::from_u32((x as u64 * max / span) as u32))
}

/// Image in which neighbouring pixels differ, to catch misplaced copies.
pub fn pattern<T: Sample>(width: u32, height: u32) -> Raster<T> {
    let modulus = T::MAX.to_u32() as u64 + 1;
    Raster::from_fn(width, height, |y, x| {
        T::from_u32(((y as u64 * 131 + x as u64 * 7 + 3) % modulus) as u32)
    })
}

/// Image with every pixel set to `value`.
pub fn constant<T: Sample>(width: u32, height: u32, value: T) -> Raster<T> {
    Raster::from_fn(width, height, |_, _| value)
}

// =============================================================================
// Containers
// =============================================================================

/// Empty in-memory container.
pub fn memory_container() -> TiffContainer<MemoryCodec> {
    TiffContainer::with_codec(MemoryCodec::new()).expect("empty memory codec opens")
}

// =============================================================================
// Foreign TIFF files
// =============================================================================

/// Write an uncompressed 8-bit strip image with the `tiff` crate's own layout.
pub fn write_foreign_gray8(path: &Path, raster: &Raster<u8>) {
    let file = File::create(path).unwrap();
    let mut encoder = TiffEncoder::new(file).unwrap();
    encoder
        .write_image::<Gray8>(raster.width(), raster.height(), raster.as_slice())
        .unwrap();
}

/// Write an uncompressed 16-bit strip image with the `tiff` crate's own layout.
pub fn write_foreign_gray16(path: &Path, raster: &Raster<u16>) {
    let file = File::create(path).unwrap();
    let mut encoder = TiffEncoder::new(file).unwrap();
    encoder
        .write_image::<Gray16>(raster.width(), raster.height(), raster.as_slice())
        .unwrap();
}

/// Write an LZW-compressed 8-bit strip image.
pub fn write_foreign_lzw(path: &Path, raster: &Raster<u8>) {
    let file = File::create(path).unwrap();
    let mut encoder = TiffEncoder::new(file).unwrap();
    encoder
        .write_image_with_compression::<Gray8, _>(
            raster.width(),
            raster.height(),
            Lzw::default(),
            raster.as_slice(),
        )
        .unwrap();
}

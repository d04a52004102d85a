//! Region I/O through the container façade, backed by the in-memory codec.

use pyramid_tiff::{
    ChunkData, Crop, MemoryCodec, PixelBuffer, Raster, Region, SampleDepth, SampleValue,
    TagSet, TiffContainer, TiffError,
};

use super::test_utils::{memory_container, pattern};

fn tiled(width: u32, height: u32, tile: u32, depth: SampleDepth) -> TagSet {
    TagSet::new(width, height, depth).with_tiles(tile, tile)
}

// =============================================================================
// Round trips
// =============================================================================

#[test]
fn test_full_round_trip_tiled_u16() {
    let mut c = memory_container();
    let image = pattern::<u16>(37, 23);
    let index = c
        .append_subfile(tiled(37, 23, 16, SampleDepth::Sixteen), &image, true)
        .unwrap();
    assert_eq!(index, 0);

    let back = c.read_full::<u16>(0).unwrap();
    assert_eq!(back, image);
}

#[test]
fn test_full_round_trip_strips_u8() {
    let mut c = memory_container();
    let image = pattern::<u8>(19, 11);
    let tags = TagSet::new(19, 11, SampleDepth::Eight).with_rows_per_strip(4);
    c.write_full(tags, &image, false).unwrap();

    assert_eq!(c.read_full::<u8>(-1).unwrap(), image);
    match c.read().unwrap() {
        PixelBuffer::U8(raster) => assert_eq!(raster, image),
        other => panic!("unexpected buffer {:?}", other.depth()),
    }
}

#[test]
fn test_region_reads_match_window() {
    let mut c = memory_container();
    let image = pattern::<u8>(50, 40);
    c.append_subfile(tiled(50, 40, 16, SampleDepth::Eight), &image, true)
        .unwrap();

    for (y1, x1, y2, x2) in [
        (0, 0, 1, 1),
        (0, 0, 40, 50),
        (15, 15, 17, 17),
        (16, 16, 32, 32),
        (3, 47, 39, 50),
        (39, 0, 40, 50),
    ] {
        let region = c
            .read_region::<u8>(0, Region::new(y1, x1, y2, x2))
            .unwrap();
        let expected = image.window(y1 as u32, x1 as u32, y2 as u32, x2 as u32);
        assert_eq!(region, expected, "region ({}, {}) - ({}, {})", y1, x1, y2, x2);
    }
}

#[test]
fn test_reads_do_not_depend_on_chunk_layout() {
    let image = pattern::<u16>(45, 33);
    let layouts = [
        tiled(45, 33, 16, SampleDepth::Sixteen),
        tiled(45, 33, 64, SampleDepth::Sixteen),
        TagSet::new(45, 33, SampleDepth::Sixteen).with_rows_per_strip(1),
        TagSet::new(45, 33, SampleDepth::Sixteen).with_rows_per_strip(7),
        TagSet::new(45, 33, SampleDepth::Sixteen),
    ];

    let mut c = memory_container();
    for tags in layouts {
        let is_tiled = tags.is_tiled();
        c.append_subfile(tags, &image, is_tiled).unwrap();
    }

    let region = Region::new(5, 9, 30, 41);
    let reference = c.read_region::<u16>(0, region).unwrap();
    for subfile in 1..5 {
        assert_eq!(c.read_region::<u16>(subfile, region).unwrap(), reference);
    }
}

#[test]
fn test_read_region_any_keeps_depth() {
    let mut c = memory_container();
    c.append_subfile(TagSet::new(4, 4, SampleDepth::Eight), &pattern::<u8>(4, 4), false)
        .unwrap();
    c.append_subfile(TagSet::new(4, 4, SampleDepth::Sixteen), &pattern::<u16>(4, 4), false)
        .unwrap();

    let region = Region::new(0, 0, 2, 2);
    assert_eq!(c.read_region_any(0, region).unwrap().depth(), SampleDepth::Eight);
    assert_eq!(c.read_region_any(1, region).unwrap().depth(), SampleDepth::Sixteen);
}

// =============================================================================
// Pending subfile window
// =============================================================================

#[test]
fn test_region_writes_assemble_an_image() {
    let mut c = memory_container();
    let image = pattern::<u8>(30, 20);
    let index = c.begin_subfile(tiled(30, 20, 16, SampleDepth::Eight)).unwrap();

    // four quadrants, split off the tile grid
    for (y1, x1, y2, x2) in [(0, 0, 7, 13), (0, 13, 7, 30), (7, 0, 20, 13), (7, 13, 20, 30)] {
        let block = image.window(y1, x1, y2, x2);
        c.write_region(
            index as isize,
            &block,
            Region::new(y1 as i64, x1 as i64, y2 as i64, x2 as i64),
        )
        .unwrap();
    }
    assert_eq!(c.finish_subfile().unwrap(), index);
    assert_eq!(c.read_full::<u8>(0).unwrap(), image);
}

#[test]
fn test_finalized_subfiles_are_immutable() {
    let mut c = memory_container();
    c.append_subfile(TagSet::new(8, 8, SampleDepth::Eight), &pattern::<u8>(8, 8), false)
        .unwrap();

    let block = Raster::<u8>::new(2, 2);
    let region = Region::new(0, 0, 2, 2);
    assert!(matches!(
        c.write_region(0, &block, region),
        Err(TiffError::ImmutableSubfile(0))
    ));
    assert!(matches!(
        c.write_region(-1, &block, region),
        Err(TiffError::ImmutableSubfile(0))
    ));

    // with a pending subfile, -2 still names the finalized one
    c.begin_subfile(TagSet::new(8, 8, SampleDepth::Eight)).unwrap();
    assert!(matches!(
        c.write_region(-2, &block, region),
        Err(TiffError::ImmutableSubfile(0))
    ));
    c.write_region(-1, &block, region).unwrap();
    c.write_region(1, &block, region).unwrap();
}

#[test]
fn test_write_region_out_of_range() {
    let mut c = memory_container();
    let block = Raster::<u8>::new(1, 1);
    let region = Region::new(0, 0, 1, 1);
    assert!(matches!(
        c.write_region(0, &block, region),
        Err(TiffError::SubfileOutOfRange { index: 0, count: 0 })
    ));

    c.begin_subfile(TagSet::new(4, 4, SampleDepth::Eight)).unwrap();
    assert!(matches!(
        c.write_region(1, &block, region),
        Err(TiffError::SubfileOutOfRange { index: 1, count: 1 })
    ));
    assert!(matches!(
        c.write_region(0, &block, Region::new(0, 0, 5, 1)),
        Err(TiffError::InvalidRegion { .. })
    ));
}

#[test]
fn test_finish_without_pending_fails() {
    let mut c = memory_container();
    assert!(matches!(
        c.finish_subfile(),
        Err(TiffError::InvalidConfiguration(_))
    ));
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn test_invalid_regions_are_rejected() {
    let mut c = memory_container();
    c.append_subfile(TagSet::new(10, 6, SampleDepth::Eight), &pattern::<u8>(10, 6), false)
        .unwrap();

    for region in [
        Region::new(-1, 0, 2, 2),
        Region::new(0, 0, 7, 2),
        Region::new(0, 0, 2, 11),
        Region::new(3, 3, 3, 5),
        Region::new(4, 2, 2, 5),
    ] {
        assert!(
            matches!(
                c.read_region::<u8>(0, region),
                Err(TiffError::InvalidRegion {
                    width: 10,
                    height: 6,
                    ..
                })
            ),
            "{:?}",
            region
        );
    }
}

#[test]
fn test_subfile_index_wraps() {
    let mut c = memory_container();
    for width in [8, 4, 2] {
        let tags = TagSet::new(width, 2, SampleDepth::Eight);
        c.append_subfile(tags, &pattern::<u8>(width, 2), false).unwrap();
    }

    assert_eq!(c.read_full::<u8>(-1).unwrap().width(), 2);
    assert_eq!(c.read_full::<u8>(-3).unwrap().width(), 8);
    assert!(matches!(
        c.read_full::<u8>(3),
        Err(TiffError::SubfileOutOfRange { index: 3, count: 3 })
    ));
    assert!(matches!(
        c.read_full::<u8>(-4),
        Err(TiffError::SubfileOutOfRange { index: -4, count: 3 })
    ));
}

#[test]
fn test_depth_mismatch_is_reported() {
    let mut c = memory_container();
    c.append_subfile(TagSet::new(4, 4, SampleDepth::Eight), &pattern::<u8>(4, 4), false)
        .unwrap();
    assert!(matches!(
        c.read_full::<u16>(0),
        Err(TiffError::UnsupportedDepth {
            expected: "16",
            found: 8
        })
    ));
}

#[test]
fn test_unsupported_depth_in_codec() {
    let mut codec = MemoryCodec::new();
    let mut tags = TagSet::new(2, 2, SampleDepth::Eight);
    tags.bits_per_sample = 32;
    codec.push_subfile(tags, vec![ChunkData::U8(vec![0; 4])]);

    let mut c = TiffContainer::with_codec(codec).unwrap();
    assert_eq!(c.page_count(), 1);
    assert!(matches!(
        c.read_subfile(0),
        Err(TiffError::UnsupportedDepth {
            expected: "8 or 16",
            found: 32
        })
    ));
}

// =============================================================================
// Geometry and crops
// =============================================================================

#[test]
fn test_image_geometry_uses_second_to_last_subfile() {
    let mut c = memory_container();
    assert!(matches!(c.image_width(), Err(TiffError::EmptyDirectory)));

    c.append_subfile(tiled(64, 48, 16, SampleDepth::Eight), &pattern::<u8>(64, 48), true)
        .unwrap();
    assert_eq!(c.image_width().unwrap(), 64);

    c.append_subfile(tiled(32, 24, 32, SampleDepth::Eight), &pattern::<u8>(32, 24), true)
        .unwrap();
    c.append_subfile(tiled(16, 12, 16, SampleDepth::Eight), &pattern::<u8>(16, 12), true)
        .unwrap();
    assert_eq!(c.page_count(), 3);
    assert_eq!(c.image_width().unwrap(), 32);
    assert_eq!(c.image_height().unwrap(), 24);
    assert_eq!(c.tile_width().unwrap(), 32);
    assert_eq!(c.tile_height().unwrap(), 32);
    assert_eq!(c.tags(0).unwrap().image_width, 64);
}

#[test]
fn test_crop_single_pixel_is_a_sample() {
    let mut c = memory_container();
    let image = pattern::<u16>(12, 9);
    c.append_subfile(TagSet::new(12, 9, SampleDepth::Sixteen), &image, false)
        .unwrap();

    let crop = c.crop(Region::new(4, 7, 5, 8), 0).unwrap();
    let expected = image.get(4, 7).unwrap();
    assert_eq!(crop, Crop::Sample(SampleValue::U16(expected)));

    match c.crop(Region::new(4, 7, 6, 8), -1).unwrap() {
        Crop::Region(PixelBuffer::U16(raster)) => {
            assert_eq!((raster.height(), raster.width()), (2, 1));
            assert_eq!(raster.get(1, 0), image.get(5, 7));
        }
        other => panic!("unexpected crop {:?}", other),
    }
}

//! File-backed containers: TIFF and BigTIFF persistence.

use std::fs;

use pyramid_tiff::{
    CodecError, CropStrategy, Raster, Region, SampleDepth, SubfileKind, TagSet, TiffContainer,
    TiffError, TiffVersion,
};

use super::test_utils::{
    pattern, ramp, write_foreign_gray16, write_foreign_gray8, write_foreign_lzw,
};

// =============================================================================
// Creating and reopening
// =============================================================================

#[test]
fn test_file_is_created_on_first_finish() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lazy.tif");

    let mut c = TiffContainer::open(&path, TiffVersion::Classic).unwrap();
    assert_eq!(c.path(), Some(path.as_path()));
    assert_eq!(c.page_count(), 0);

    c.begin_subfile(TagSet::new(4, 4, SampleDepth::Eight)).unwrap();
    c.discard_subfile();
    assert!(!path.exists());

    c.append_subfile(TagSet::new(4, 4, SampleDepth::Eight), &pattern::<u8>(4, 4), false)
        .unwrap();
    assert!(path.exists());
    c.close().unwrap();
}

#[test]
fn test_round_trip_through_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("roundtrip.tif");

    let tiled_image = pattern::<u16>(70, 45);
    let strip_image = pattern::<u8>(33, 21);
    {
        let mut c = TiffContainer::open(&path, TiffVersion::Classic).unwrap();
        let tags = TagSet::new(70, 45, SampleDepth::Sixteen)
            .with_tiles(32, 32)
            .with_page(0, 2);
        c.append_subfile(tags, &tiled_image, true).unwrap();
        let tags = TagSet::new(33, 21, SampleDepth::Eight)
            .with_rows_per_strip(8)
            .with_kind(SubfileKind::Page);
        c.append_subfile(tags, &strip_image, false).unwrap();
        c.close().unwrap();
    }

    let mut c = TiffContainer::open(&path, TiffVersion::Big).unwrap();
    assert_eq!(c.version(), TiffVersion::Classic);
    assert_eq!(c.page_count(), 2);

    let first = c.tags(0).unwrap();
    assert_eq!((first.tile_width, first.tile_height), (32, 32));
    assert_eq!(first.page.map(|p| (p.number, p.count)), Some((0, 2)));
    let (min, max) = tiled_image.min_max().unwrap();
    assert_eq!((first.min_sample_value, first.max_sample_value), (min, max));

    let second = c.tags(1).unwrap();
    assert_eq!(second.subfile_kind, SubfileKind::Page);
    assert_eq!(second.rows_per_strip, 8);
    assert!(!second.is_tiled());

    assert_eq!(c.read_full::<u16>(0).unwrap(), tiled_image);
    assert_eq!(c.read_full::<u8>(1).unwrap(), strip_image);
    assert_eq!(
        c.read_region::<u16>(0, Region::new(30, 31, 45, 70)).unwrap(),
        tiled_image.window(30, 31, 45, 70)
    );
}

#[test]
fn test_bigtiff_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("big.tif");

    let image = pattern::<u8>(50, 50);
    let mut c = TiffContainer::open(&path, TiffVersion::Big).unwrap();
    c.append_subfile(TagSet::new(50, 50, SampleDepth::Eight).with_tiles(16, 16), &image, true)
        .unwrap();
    c.close().unwrap();

    let header = fs::read(&path).unwrap();
    assert_eq!(&header[..4], &[b'I', b'I', 43, 0]);

    let mut c = TiffContainer::open(&path, TiffVersion::Classic).unwrap();
    assert_eq!(c.version(), TiffVersion::Big);
    assert_eq!(c.read_full::<u8>(0).unwrap(), image);
}

#[test]
fn test_pyramid_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pyramid.tif");

    let base = ramp::<u16>(300, 200);
    {
        let mut c = TiffContainer::open(&path, TiffVersion::Classic).unwrap();
        assert_eq!(c.build_pyramid(&base, 64).unwrap(), 0..5);
        c.close().unwrap();
    }

    let mut c = TiffContainer::open_with_cache(&path, TiffVersion::Classic, 4).unwrap();
    let widths: Vec<u32> = c.directory().iter().map(|t| t.image_width).collect();
    assert_eq!(widths, vec![300, 150, 75, 38, 19]);
    assert_eq!(c.pyramid_levels().len(), 5);
    assert_eq!(c.read_full::<u16>(0).unwrap(), base);

    // 100 rows need shift 1 (64 << 1 = 128)
    let crop = c
        .multi_page_crop(Region::new(0, 0, 100, 120), CropStrategy::FitPageTile)
        .unwrap();
    assert_eq!(crop, c.read_region_any(1, Region::new(0, 0, 50, 60)).unwrap());
}

#[test]
fn test_discard_leaves_file_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("discard.tif");

    let mut c = TiffContainer::open(&path, TiffVersion::Classic).unwrap();
    c.append_subfile(TagSet::new(8, 8, SampleDepth::Eight), &pattern::<u8>(8, 8), false)
        .unwrap();
    let before = fs::read(&path).unwrap();

    c.begin_subfile(TagSet::new(8, 8, SampleDepth::Eight)).unwrap();
    c.write_region(1, &Raster::from_fn(8, 8, |_, _| 9u8), Region::new(0, 0, 8, 8))
        .unwrap();
    c.discard_subfile();
    c.close().unwrap();

    assert_eq!(fs::read(&path).unwrap(), before);
    let c = TiffContainer::open(&path, TiffVersion::Classic).unwrap();
    assert_eq!(c.page_count(), 1);
}

// =============================================================================
// Files written by other tools
// =============================================================================

#[test]
fn test_reads_foreign_strip_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("foreign8.tif");
    let image = pattern::<u8>(300, 200);
    write_foreign_gray8(&path, &image);

    let mut c = TiffContainer::open(&path, TiffVersion::Classic).unwrap();
    assert_eq!(c.page_count(), 1);
    let tags = c.tags(0).unwrap().clone();
    assert_eq!(tags.subfile_kind, SubfileKind::Undefined);
    assert_eq!((tags.image_width, tags.image_height), (300, 200));
    assert!(!tags.is_tiled());
    assert_eq!(tags.max_sample_value, 255);

    assert_eq!(c.read_full::<u8>(0).unwrap(), image);
    assert_eq!(
        c.read_region::<u8>(0, Region::new(57, 123, 190, 300)).unwrap(),
        image.window(57, 123, 190, 300)
    );
}

#[test]
fn test_appends_to_foreign_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("foreign16.tif");
    let image = pattern::<u16>(40, 30);
    write_foreign_gray16(&path, &image);

    let mut c = TiffContainer::open(&path, TiffVersion::Big).unwrap();
    assert_eq!(c.version(), TiffVersion::Classic);
    let thumb = pattern::<u16>(20, 15);
    c.append_subfile(TagSet::new(20, 15, SampleDepth::Sixteen), &thumb, false)
        .unwrap();
    c.close().unwrap();

    let mut c = TiffContainer::open(&path, TiffVersion::Classic).unwrap();
    assert_eq!(c.page_count(), 2);
    assert_eq!(c.read_full::<u16>(0).unwrap(), image);
    assert_eq!(c.read_full::<u16>(1).unwrap(), thumb);
}

#[test]
fn test_compressed_file_is_read_only() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lzw.tif");
    let image = pattern::<u8>(64, 48);
    write_foreign_lzw(&path, &image);
    let before = fs::read(&path).unwrap();

    let mut c = TiffContainer::open(&path, TiffVersion::Classic).unwrap();
    assert_eq!(c.read_full::<u8>(0).unwrap(), image);

    let result = c.append_subfile(TagSet::new(4, 4, SampleDepth::Eight), &pattern::<u8>(4, 4), false);
    assert!(matches!(
        result,
        Err(TiffError::File(CodecError::Unsupported(_)))
    ));
    assert!(!c.has_pending_subfile());
    assert_eq!(c.page_count(), 1);
    assert_eq!(fs::read(&path).unwrap(), before);
}

#[test]
fn test_rejects_non_tiff_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("not-a-tiff.tif");
    fs::write(&path, b"PK\x03\x04 definitely a zip").unwrap();

    assert!(matches!(
        TiffContainer::open(&path, TiffVersion::Classic),
        Err(TiffError::File(CodecError::InvalidMagic(_)))
    ));
}

#[test]
fn test_rejects_unknown_version() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("v44.tif");
    fs::write(&path, [b'I', b'I', 44, 0, 8, 0, 0, 0]).unwrap();

    assert!(matches!(
        TiffContainer::open(&path, TiffVersion::Classic),
        Err(TiffError::File(CodecError::InvalidVersion(44)))
    ));
}

//! Pyramid construction and level selection.

use pyramid_tiff::{
    downsample, CropStrategy, PixelBuffer, PyramidBuilder, PyramidConfig, Raster, Region,
    SampleDepth, SubfileKind, TagSet, TiffError, MAX_TILE_SIZE,
};

use super::test_utils::{constant, memory_container, pattern, ramp};

fn widths<C: pyramid_tiff::TiffCodec>(c: &pyramid_tiff::TiffContainer<C>) -> Vec<u32> {
    c.directory().iter().map(|t| t.image_width).collect()
}

// =============================================================================
// Building
// =============================================================================

#[test]
fn test_ramp_pyramid_levels() {
    let mut c = memory_container();
    let base = ramp::<u8>(1024, 1024);
    assert_eq!(base.get(0, 1023), Some(255));
    assert_eq!(base.get(1023, 1023), Some(255));

    let range = c.build_pyramid(&base, 512).unwrap();
    assert_eq!(range, 0..5);
    assert_eq!(widths(&c), vec![1024, 512, 256, 128, 64]);

    for (index, tags) in c.directory().iter().enumerate() {
        assert!(tags.is_tiled());
        assert_eq!((tags.tile_width, tags.tile_height), (512, 512));
        assert_eq!(tags.image_height, tags.image_width);
        let expected_kind = if index == 0 {
            SubfileKind::Undefined
        } else {
            SubfileKind::ReducedResolution
        };
        assert_eq!(tags.subfile_kind, expected_kind);
    }

    let top_right = c.read_region::<u8>(0, Region::new(0, 1023, 1, 1024)).unwrap();
    assert_eq!(top_right.as_slice(), &[255]);
    assert_eq!(c.tags(0).unwrap().max_sample_value, 255);
    assert_eq!(c.tags(0).unwrap().min_sample_value, 0);
}

#[test]
fn test_sixteen_bit_ramp_keeps_depth() {
    let mut c = memory_container();
    let base = ramp::<u16>(256, 64);
    assert_eq!(base.get(63, 255), Some(u16::MAX));

    c.build_pyramid(&base, 64).unwrap();
    assert!(c
        .directory()
        .iter()
        .all(|t| t.bits_per_sample == 16));
    let corner = c.read_region::<u16>(0, Region::new(63, 255, 64, 256)).unwrap();
    assert_eq!(corner.as_slice(), &[u16::MAX]);
}

#[test]
fn test_odd_sizes_round_up() {
    let mut c = memory_container();
    c.build_pyramid(&pattern::<u8>(100, 100), 16).unwrap();
    assert_eq!(widths(&c), vec![100, 50, 25, 13, 7]);
}

#[test]
fn test_levels_match_repeated_downsampling() {
    let mut c = memory_container();
    let base = pattern::<u16>(90, 70);
    c.build_pyramid(&base, 32).unwrap();

    let mut expected = base.clone();
    for level in 0..c.page_count() {
        assert_eq!(c.read_full::<u16>(level as isize).unwrap(), expected, "level {}", level);
        expected = downsample(&expected);
    }
}

#[test]
fn test_constant_image_stays_constant() {
    let mut c = memory_container();
    c.build_pyramid(&constant(33, 17, 77u8), 16).unwrap();
    for level in 0..c.page_count() {
        let raster = c.read_full::<u8>(level as isize).unwrap();
        assert!(raster.as_slice().iter().all(|&v| v == 77));
    }
}

#[test]
fn test_builder_limits() {
    let mut c = memory_container();
    let builder = PyramidBuilder::new(PyramidConfig {
        tile_size: 16,
        max_levels: 2,
        min_level_size: 1,
    });
    assert_eq!(c.build_pyramid_with(&pattern::<u8>(64, 64), &builder).unwrap(), 0..2);

    let mut c = memory_container();
    let builder = PyramidBuilder::new(PyramidConfig {
        tile_size: 16,
        max_levels: 10,
        min_level_size: 30,
    });
    c.build_pyramid_with(&pattern::<u8>(100, 100), &builder)
        .unwrap();
    assert_eq!(widths(&c), vec![100, 50, 25]);

    let mut c = memory_container();
    let builder = PyramidBuilder::new(PyramidConfig {
        tile_size: 16,
        max_levels: 10,
        min_level_size: 1,
    });
    c.build_pyramid_with(&pattern::<u8>(5, 3), &builder).unwrap();
    assert_eq!(widths(&c), vec![5, 3, 2, 1]);
}

#[test]
fn test_build_requires_empty_container() {
    let mut c = memory_container();
    c.append_subfile(TagSet::new(4, 4, SampleDepth::Eight), &pattern::<u8>(4, 4), false)
        .unwrap();
    assert!(matches!(
        c.build_pyramid(&pattern::<u8>(32, 32), 16),
        Err(TiffError::InvalidConfiguration(_))
    ));
    assert_eq!(c.page_count(), 1);
}

#[test]
fn test_build_rejects_zero_tile_size() {
    let mut c = memory_container();
    assert!(matches!(
        c.build_pyramid(&pattern::<u8>(32, 32), 0),
        Err(TiffError::InvalidConfiguration(_))
    ));
    assert_eq!(c.page_count(), 0);
}

#[test]
fn test_build_rejects_oversized_tiles() {
    let mut c = memory_container();
    assert!(matches!(
        c.build_pyramid(&pattern::<u8>(4, 4), 1 << 20),
        Err(TiffError::InvalidConfiguration(_))
    ));
    assert!(!c.has_pending_subfile());
    assert_eq!(c.page_count(), 0);

    let tags = TagSet::new(4, 4, SampleDepth::Eight).with_tiles(MAX_TILE_SIZE + 1, 16);
    assert!(matches!(
        c.append_subfile(tags, &pattern::<u8>(4, 4), true),
        Err(TiffError::InvalidConfiguration(_))
    ));
    assert_eq!(c.page_count(), 0);
}

#[test]
fn test_template_tags_are_inherited() {
    let mut template = TagSet::new(1, 1, SampleDepth::Eight).with_page(0, 1);
    template.photometric = 0;
    let builder = PyramidBuilder::new(PyramidConfig::with_tile_size(16)).with_template(template);

    let mut c = memory_container();
    c.build_pyramid_with(&pattern::<u8>(40, 40), &builder).unwrap();
    assert!(c.directory().iter().all(|t| t.photometric == 0));
    assert!(c.tags(0).unwrap().page.is_some());
    assert!(c.tags(1).unwrap().page.is_none());
}

// =============================================================================
// Level identification and crops
// =============================================================================

#[test]
fn test_built_pyramid_is_identified() {
    let mut c = memory_container();
    c.build_pyramid(&pattern::<u8>(100, 60), 16).unwrap();
    let levels = c.pyramid_levels();
    assert_eq!(levels.len(), 5);
    for (index, level) in levels.iter().enumerate() {
        assert_eq!(level.level_index, index);
        assert_eq!(level.subfile, index);
        assert_eq!(level.shift, index as u32);
    }
}

#[test]
fn test_strip_subfiles_are_not_levels() {
    let mut c = memory_container();
    c.build_pyramid(&pattern::<u8>(64, 64), 16).unwrap();
    // a large strip thumbnail-style subfile after the pyramid
    c.append_subfile(TagSet::new(128, 128, SampleDepth::Eight), &pattern::<u8>(128, 128), false)
        .unwrap();

    let levels = c.pyramid_levels();
    assert_eq!(levels.base().unwrap().subfile, 0);
    assert!(levels.iter().all(|l| l.subfile != 5));
}

#[test]
fn test_fit_page_tile_uses_finest_fitting_level() {
    let mut c = memory_container();
    c.build_pyramid(&ramp::<u8>(1024, 1024), 512).unwrap();

    // fits in one 512 tile of level 0
    let small = Region::new(10, 10, 20, 20);
    let crop = c.multi_page_crop(small, CropStrategy::FitPageTile).unwrap();
    assert_eq!(crop, c.read_region_any(0, small).unwrap());

    // 600 pixels fit in one tile of level 1 (512 << 1)
    let medium = Region::new(0, 0, 600, 600);
    let crop = c.multi_page_crop(medium, CropStrategy::FitPageTile).unwrap();
    assert_eq!((crop.width(), crop.height()), (300, 300));
    assert_eq!(crop, c.read_region_any(1, Region::new(0, 0, 300, 300)).unwrap());
}

#[test]
fn test_fit_page_tile_rescales_outward() {
    let mut c = memory_container();
    c.build_pyramid(&pattern::<u16>(100, 100), 16).unwrap();

    // 21 pixels tall needs shift 1 (16 << 1 = 32)
    let crop = c
        .multi_page_crop(Region::new(5, 7, 26, 20), CropStrategy::FitPageTile)
        .unwrap();
    let direct = c.read_region_any(1, Region::new(2, 3, 13, 10)).unwrap();
    assert_eq!(crop, direct);
}

#[test]
fn test_fit_page_tile_falls_back_to_coarsest() {
    let mut c = memory_container();
    let builder = PyramidBuilder::new(PyramidConfig {
        tile_size: 16,
        max_levels: 2,
        min_level_size: 1,
    });
    c.build_pyramid_with(&pattern::<u8>(200, 200), &builder)
        .unwrap();

    let crop = c
        .multi_page_crop(Region::new(0, 0, 200, 200), CropStrategy::FitPageTile)
        .unwrap();
    match crop {
        PixelBuffer::U8(raster) => {
            assert_eq!((raster.width(), raster.height()), (100, 100));
            assert_eq!(raster, c.read_full::<u8>(1).unwrap());
        }
        other => panic!("unexpected depth {:?}", other.depth()),
    }
}

#[test]
fn test_multi_page_crop_errors() {
    let mut c = memory_container();
    assert!(matches!(
        c.multi_page_crop(Region::new(0, 0, 1, 1), CropStrategy::FitPageTile),
        Err(TiffError::EmptyDirectory)
    ));

    c.append_subfile(TagSet::new(8, 8, SampleDepth::Eight), &pattern::<u8>(8, 8), false)
        .unwrap();
    assert!(matches!(
        c.multi_page_crop(Region::new(0, 0, 1, 1), CropStrategy::FitPageTile),
        Err(TiffError::InvalidConfiguration(_))
    ));

    let mut c = memory_container();
    c.build_pyramid(&pattern::<u8>(32, 32), 16).unwrap();
    assert!(matches!(
        c.multi_page_crop(Region::new(0, 0, 33, 8), CropStrategy::FitPageTile),
        Err(TiffError::InvalidRegion { .. })
    ));
}

#[test]
fn test_downsample_matches_level_one_crop() {
    let base = pattern::<u8>(48, 48);
    let mut c = memory_container();
    c.build_pyramid(&base, 16).unwrap();

    let expected: Raster<u8> = downsample(&base).window(4, 4, 20, 20);
    let crop = c
        .multi_page_crop(Region::new(8, 8, 40, 40), CropStrategy::FitPageTile)
        .unwrap();
    assert_eq!(crop, PixelBuffer::U8(expected));
}

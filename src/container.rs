//! The container façade.
//!
//! [`TiffContainer`] owns the codec and the [`SubfileDirectory`] and ties the
//! region, pyramid and crop components together. All access is synchronous
//! and goes through `&mut self`; one container exclusively owns one codec.
//!
//! # Subfile lifecycle
//!
//! Finalized subfiles are read-only. New data is written through a pending
//! subfile:
//!
//! 1. [`TiffContainer::begin_subfile`] appends a zero-filled pending subfile
//! 2. [`TiffContainer::write_region`] fills it in, any number of times
//! 3. [`TiffContainer::finish_subfile`] hands it to the codec and adds it to
//!    the directory, or [`TiffContainer::discard_subfile`] drops it
//!
//! [`TiffContainer::append_subfile`] does all three for a whole image at once
//! and leaves no trace if any step fails.

use std::ops::Range;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::codec::{FileCodec, TiffCodec, TiffVersion};
use crate::error::TiffError;
use crate::format::{wrap_index, SubfileDirectory, TagSet};
use crate::pyramid::{
    Crop, CropStrategy, PyramidBuilder, PyramidConfig, PyramidCropEngine, PyramidLevels,
};
use crate::raster::{PixelBuffer, Raster, Sample};
use crate::region::{self, PendingSubfile, Rect, Region};

/// A pyramidal TIFF image: a directory of subfiles backed by a codec.
pub struct TiffContainer<C: TiffCodec = FileCodec> {
    path: Option<PathBuf>,
    codec: C,
    directory: SubfileDirectory,
    pending: Option<PendingSubfile>,
}

impl TiffContainer<FileCodec> {
    /// Open or create a TIFF file.
    ///
    /// An existing file is enumerated and keeps its own version; a missing
    /// path opens empty and will be written as `version`.
    pub fn open(path: impl AsRef<Path>, version: TiffVersion) -> Result<Self, TiffError> {
        let path = path.as_ref();
        let codec = FileCodec::open(path, version)?;
        let mut container = Self::with_codec(codec)?;
        container.path = Some(path.to_path_buf());
        Ok(container)
    }

    /// Like [`TiffContainer::open`], with a chunk cache of `cache_capacity` entries.
    pub fn open_with_cache(
        path: impl AsRef<Path>,
        version: TiffVersion,
        cache_capacity: usize,
    ) -> Result<Self, TiffError> {
        let path = path.as_ref();
        let codec = FileCodec::open_with_cache(path, version, cache_capacity)?;
        let mut container = Self::with_codec(codec)?;
        container.path = Some(path.to_path_buf());
        Ok(container)
    }
}

impl<C: TiffCodec> TiffContainer<C> {
    /// Wrap a codec, enumerating the subfiles it already holds.
    pub fn with_codec(mut codec: C) -> Result<Self, TiffError> {
        let directory = SubfileDirectory::from_entries(codec.directories()?);
        debug!(
            subfiles = directory.len(),
            version = codec.version().as_u16(),
            "Opened container"
        );
        Ok(Self {
            path: None,
            codec,
            directory,
            pending: None,
        })
    }

    // -------------------------------------------------------------------------
    // Metadata
    // -------------------------------------------------------------------------

    /// Backing file, if the container was opened from a path.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn version(&self) -> TiffVersion {
        self.codec.version()
    }

    pub fn directory(&self) -> &SubfileDirectory {
        &self.directory
    }

    /// Tags of one subfile; negative indices count from the end.
    pub fn tags(&self, subfile: isize) -> Result<&TagSet, TiffError> {
        self.directory.tags(subfile)
    }

    /// Number of finalized subfiles.
    pub fn page_count(&self) -> usize {
        self.directory.page_count()
    }

    pub fn image_width(&self) -> Result<u32, TiffError> {
        self.directory.image_width()
    }

    pub fn image_height(&self) -> Result<u32, TiffError> {
        self.directory.image_height()
    }

    pub fn tile_width(&self) -> Result<u32, TiffError> {
        self.directory.tile_width()
    }

    pub fn tile_height(&self) -> Result<u32, TiffError> {
        self.directory.tile_height()
    }

    /// The subfiles that form the resolution pyramid.
    pub fn pyramid_levels(&self) -> PyramidLevels {
        PyramidLevels::from_directory(&self.directory)
    }

    pub fn has_pending_subfile(&self) -> bool {
        self.pending.is_some()
    }

    // -------------------------------------------------------------------------
    // Reading
    // -------------------------------------------------------------------------

    /// Read `region` of a finalized subfile as `T` samples.
    pub fn read_region<T: Sample>(
        &mut self,
        subfile: isize,
        region: Region,
    ) -> Result<Raster<T>, TiffError> {
        let (index, rect) = self.resolve_read(subfile, region)?;
        let tags = self.directory.get(index)?;
        region::read_region(&mut self.codec, index, tags, rect)
    }

    /// Read `region` of a finalized subfile at its stored depth.
    pub fn read_region_any(&mut self, subfile: isize, region: Region) -> Result<PixelBuffer, TiffError> {
        let (index, rect) = self.resolve_read(subfile, region)?;
        let tags = self.directory.get(index)?;
        region::read_region_any(&mut self.codec, index, tags, rect)
    }

    /// Read a whole subfile as `T` samples.
    pub fn read_full<T: Sample>(&mut self, subfile: isize) -> Result<Raster<T>, TiffError> {
        let tags = self.directory.tags(subfile)?;
        let region = Region::from(Rect::full(tags.image_width, tags.image_height));
        self.read_region(subfile, region)
    }

    /// Read a whole subfile at its stored depth.
    pub fn read_subfile(&mut self, subfile: isize) -> Result<PixelBuffer, TiffError> {
        let tags = self.directory.tags(subfile)?;
        let region = Region::from(Rect::full(tags.image_width, tags.image_height));
        self.read_region_any(subfile, region)
    }

    /// Read the first subfile at its stored depth.
    pub fn read(&mut self) -> Result<PixelBuffer, TiffError> {
        self.read_subfile(0)
    }

    fn resolve_read(&self, subfile: isize, region: Region) -> Result<(usize, Rect), TiffError> {
        let index = wrap_index(subfile, self.directory.len())?;
        let tags = self.directory.get(index)?;
        let rect = region.validate(tags.image_width, tags.image_height)?;
        Ok((index, rect))
    }

    // -------------------------------------------------------------------------
    // Writing
    // -------------------------------------------------------------------------

    /// Append a pending subfile described by `tags` and return its index.
    ///
    /// The subfile starts zero-filled and is invisible to reads until
    /// [`TiffContainer::finish_subfile`].
    pub fn begin_subfile(&mut self, tags: TagSet) -> Result<usize, TiffError> {
        if let Some(pending) = &self.pending {
            return Err(TiffError::InvalidConfiguration(format!(
                "subfile {} is still pending",
                pending.index()
            )));
        }

        let pending = PendingSubfile::new(self.directory.len(), tags)?;
        self.codec.begin_subfile(pending.tags())?;
        let index = pending.index();
        debug!(
            subfile = index,
            width = pending.tags().image_width,
            height = pending.tags().image_height,
            tiled = pending.tags().is_tiled(),
            "Began subfile"
        );
        self.pending = Some(pending);
        Ok(index)
    }

    /// Write `buffer` into `region` of the pending subfile.
    ///
    /// Any index resolving to a finalized subfile fails with
    /// [`TiffError::ImmutableSubfile`].
    pub fn write_region<T: Sample>(
        &mut self,
        subfile: isize,
        buffer: &Raster<T>,
        region: Region,
    ) -> Result<(), TiffError> {
        let finalized = self.directory.len();
        let count = finalized + usize::from(self.pending.is_some());
        let index = wrap_index(subfile, count)?;
        if index < finalized {
            return Err(TiffError::ImmutableSubfile(index));
        }

        let pending = self.pending.as_mut().ok_or(TiffError::SubfileOutOfRange {
            index: subfile,
            count,
        })?;
        let tags = pending.tags();
        let rect = region.validate(tags.image_width, tags.image_height)?;
        pending.write_region(buffer, rect)
    }

    /// Finalize the pending subfile and return its index.
    ///
    /// On failure the pending subfile is discarded.
    pub fn finish_subfile(&mut self) -> Result<usize, TiffError> {
        let pending = self.pending.take().ok_or_else(|| {
            TiffError::InvalidConfiguration("no subfile is pending".to_string())
        })?;
        match pending.commit(&mut self.codec) {
            Ok(tags) => Ok(self.directory.push(tags)),
            Err(e) => {
                warn!(error = %e, "Failed to finalize subfile, discarding it");
                self.codec.discard_subfile();
                Err(e)
            }
        }
    }

    /// Drop the pending subfile, if any.
    pub fn discard_subfile(&mut self) {
        if let Some(pending) = self.pending.take() {
            debug!(subfile = pending.index(), "Discarded pending subfile");
            self.codec.discard_subfile();
        }
    }

    /// Append a complete subfile and return its index.
    ///
    /// `tiled` must agree with the tile dimensions in `tags`, and `buffer`
    /// must match the image size in `tags`. Min/max sample values are taken
    /// from `buffer`. If any step fails no subfile is added.
    pub fn append_subfile<T: Sample>(
        &mut self,
        mut tags: TagSet,
        buffer: &Raster<T>,
        tiled: bool,
    ) -> Result<usize, TiffError> {
        if tiled != tags.is_tiled() {
            return Err(TiffError::InvalidConfiguration(format!(
                "tiled = {} but tags have tile dimensions {}x{}",
                tiled, tags.tile_width, tags.tile_height
            )));
        }
        if buffer.height() != tags.image_height || buffer.width() != tags.image_width {
            return Err(TiffError::BufferShape {
                expected_height: tags.image_height,
                expected_width: tags.image_width,
                actual_height: buffer.height(),
                actual_width: buffer.width(),
            });
        }

        // the codec keeps its own copy of the tags from here on
        if let Some((min, max)) = buffer.min_max() {
            tags.min_sample_value = min.to_u16();
            tags.max_sample_value = max.to_u16();
        }
        let full = Region::from(Rect::full(tags.image_width, tags.image_height));
        let index = self.begin_subfile(tags)?;

        if let Err(e) = self.write_region(index as isize, buffer, full) {
            self.discard_subfile();
            return Err(e);
        }
        self.finish_subfile()
    }

    /// Write a complete subfile; same as [`TiffContainer::append_subfile`].
    pub fn write_full<T: Sample>(
        &mut self,
        tags: TagSet,
        buffer: &Raster<T>,
        tiled: bool,
    ) -> Result<usize, TiffError> {
        self.append_subfile(tags, buffer, tiled)
    }

    /// [`TiffContainer::append_subfile`] for a buffer of runtime depth.
    pub fn append_subfile_any(
        &mut self,
        tags: TagSet,
        buffer: &PixelBuffer,
        tiled: bool,
    ) -> Result<usize, TiffError> {
        match buffer {
            PixelBuffer::U8(raster) => self.append_subfile(tags, raster, tiled),
            PixelBuffer::U16(raster) => self.append_subfile(tags, raster, tiled),
        }
    }

    // -------------------------------------------------------------------------
    // Pyramids
    // -------------------------------------------------------------------------

    /// Build a pyramid from `base` with `tile_size` tiles and default limits.
    pub fn build_pyramid<T: Sample>(
        &mut self,
        base: &Raster<T>,
        tile_size: u32,
    ) -> Result<Range<usize>, TiffError> {
        PyramidBuilder::new(PyramidConfig::with_tile_size(tile_size)).build(self, base)
    }

    /// Build a pyramid with an explicit builder.
    pub fn build_pyramid_with<T: Sample>(
        &mut self,
        base: &Raster<T>,
        builder: &PyramidBuilder,
    ) -> Result<Range<usize>, TiffError> {
        builder.build(self, base)
    }

    /// [`TiffContainer::build_pyramid_with`] for a buffer of runtime depth.
    pub fn build_pyramid_any(
        &mut self,
        base: &PixelBuffer,
        builder: &PyramidBuilder,
    ) -> Result<Range<usize>, TiffError> {
        match base {
            PixelBuffer::U8(raster) => builder.build(self, raster),
            PixelBuffer::U16(raster) => builder.build(self, raster),
        }
    }

    /// Crop `region` from subfile `page`, in that subfile's resolution.
    pub fn crop(&mut self, region: Region, page: isize) -> Result<Crop, TiffError> {
        PyramidCropEngine::new(&self.directory, &mut self.codec).crop(region, page)
    }

    /// Crop `region`, given in level-0 pixels, from the pyramid level chosen
    /// by `strategy`.
    pub fn multi_page_crop(
        &mut self,
        region: Region,
        strategy: CropStrategy,
    ) -> Result<PixelBuffer, TiffError> {
        PyramidCropEngine::new(&self.directory, &mut self.codec).multi_page_crop(region, strategy)
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    pub fn flush(&mut self) -> Result<(), TiffError> {
        self.codec.flush()?;
        Ok(())
    }

    /// Discard any pending subfile, flush, and release the codec.
    pub fn close(mut self) -> Result<(), TiffError> {
        self.discard_subfile();
        self.codec.flush()?;
        info!(subfiles = self.directory.len(), "Closed container");
        Ok(())
    }

    /// Discard any pending subfile and hand back the codec.
    pub fn into_codec(mut self) -> C {
        self.discard_subfile();
        self.codec
    }
}

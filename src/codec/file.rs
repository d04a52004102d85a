//! File-backed codec built on the `tiff` crate.
//!
//! # Reading
//!
//! The header version is read directly (`II`/`MM` byte order mark followed by
//! 42 or 43). Subfile tags are enumerated once at open time, filling in the
//! TIFF defaults for absent tags. Decoded chunks go through an LRU cache keyed
//! by `(subfile, chunk)`.
//!
//! # Writing
//!
//! The `tiff` encoder can only write a file front to back, so finalizing a
//! subfile rewrites the whole file: every existing chunk is decoded, the new
//! subfile is appended, and the result is written to a hidden sibling file
//! that is then renamed over the original. A failed write leaves the original
//! untouched. Only uncompressed data is written, which is why files holding
//! compressed subfiles cannot be appended to.
//!
//! Every append therefore reads the whole file into memory and writes it out
//! again, so building a pyramid of `n` levels costs `O(n x file size)` in both
//! I/O and RAM. Bases of several gigabytes are impractical with this codec.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Seek, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use lru::LruCache;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::{TiffEncoder, TiffKind};
use tiff::tags::Tag;
use tracing::{debug, info};

use crate::error::CodecError;
use crate::format::{
    PageNumber, SubfileKind, TagSet, COMPRESSION_NONE, PLANAR_CONFIG_CONTIG, ROWS_PER_STRIP_MAX,
    SAMPLE_FORMAT_UINT,
};
use crate::region::ChunkGrid;

use super::{ChunkData, PendingChunks, TiffCodec, TiffVersion};

// =============================================================================
// Constants
// =============================================================================

/// Default number of decoded chunks kept in the cache.
pub const DEFAULT_CHUNK_CACHE_CAPACITY: usize = 256;

/// PageNumber tag id (not named by the `tiff` crate).
const PAGE_NUMBER_TAG: u16 = 297;

/// Little-endian byte order mark.
const BYTE_ORDER_LITTLE: [u8; 2] = *b"II";

/// Big-endian byte order mark.
const BYTE_ORDER_BIG: [u8; 2] = *b"MM";

type FileDecoder = Decoder<BufReader<File>>;

/// A finalized subfile in the form it is written back to disk.
struct StoredSubfile {
    tags: TagSet,
    chunks: Vec<ChunkData>,
}

// =============================================================================
// FileCodec
// =============================================================================

/// Classic TIFF or BigTIFF file on disk.
///
/// A path that does not exist (or an empty file) opens as a container with no
/// subfiles; the file is created when the first subfile is finalized.
pub struct FileCodec {
    path: PathBuf,
    version: TiffVersion,
    directories: Vec<TagSet>,
    decoder: Option<FileDecoder>,
    cache: LruCache<(usize, u32), ChunkData>,
    pending: Option<PendingChunks>,
}

impl FileCodec {
    /// Open `path` with the default chunk cache.
    ///
    /// `version` applies to newly created files; an existing file keeps the
    /// version in its header.
    pub fn open(path: impl AsRef<Path>, version: TiffVersion) -> Result<Self, CodecError> {
        Self::open_with_cache(path, version, DEFAULT_CHUNK_CACHE_CAPACITY)
    }

    /// Open `path`, caching up to `cache_capacity` decoded chunks (at least one).
    pub fn open_with_cache(
        path: impl AsRef<Path>,
        version: TiffVersion,
        cache_capacity: usize,
    ) -> Result<Self, CodecError> {
        let path = path.as_ref().to_path_buf();
        let capacity = NonZeroUsize::new(cache_capacity).unwrap_or(NonZeroUsize::MIN);

        let exists = match fs::metadata(&path) {
            Ok(meta) => meta.len() > 0,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };

        let mut codec = Self {
            path,
            version,
            directories: Vec::new(),
            decoder: None,
            cache: LruCache::new(capacity),
            pending: None,
        };

        if exists {
            let file_version = read_version(&codec.path)?;
            if file_version != version {
                debug!(
                    path = %codec.path.display(),
                    requested = version.as_u16(),
                    found = file_version.as_u16(),
                    "Using the version found in the file header"
                );
            }
            codec.version = file_version;
            codec.directories = codec.enumerate()?;
            info!(
                path = %codec.path.display(),
                version = codec.version.as_u16(),
                subfiles = codec.directories.len(),
                "Opened TIFF file"
            );
        } else {
            debug!(path = %codec.path.display(), "File does not exist yet, starting empty");
        }

        Ok(codec)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decoder over the current file, opened on first use.
    fn decoder(&mut self) -> Result<&mut FileDecoder, CodecError> {
        let decoder = match self.decoder.take() {
            Some(decoder) => decoder,
            None => Decoder::new(BufReader::new(File::open(&self.path)?))?,
        };
        Ok(self.decoder.insert(decoder))
    }

    fn enumerate(&mut self) -> Result<Vec<TagSet>, CodecError> {
        let decoder = self.decoder()?;
        decoder.seek_to_image(0)?;

        let mut directories = Vec::new();
        loop {
            let tags = read_tags(decoder)?;
            debug!(
                subfile = directories.len(),
                width = tags.image_width,
                height = tags.image_height,
                bits = tags.bits_per_sample,
                tiled = tags.is_tiled(),
                "Enumerated subfile"
            );
            directories.push(tags);

            if !decoder.more_images() {
                break;
            }
            decoder.next_image()?;
        }
        Ok(directories)
    }

    fn read_chunk(&mut self, subfile: usize, index: u32, tiled: bool) -> Result<ChunkData, CodecError> {
        if let Some(chunk) = self.cache.get(&(subfile, index)) {
            return Ok(chunk.clone());
        }

        let tags = self
            .directories
            .get(subfile)
            .ok_or(CodecError::NoSuchSubfile(subfile))?;
        if tags.is_tiled() != tiled {
            return Err(CodecError::ChunkMismatch(format!(
                "subfile {} is not {}",
                subfile,
                if tiled { "tiled" } else { "strip-organized" }
            )));
        }
        let grid =
            ChunkGrid::for_tags(tags).map_err(|e| CodecError::Unsupported(e.to_string()))?;
        if index >= grid.chunk_count() {
            return Err(CodecError::NoSuchChunk {
                subfile,
                chunk: index,
            });
        }

        let decoder = self.decoder()?;
        decoder.seek_to_image(subfile)?;
        let chunk = match decoder.read_chunk(index)? {
            DecodingResult::U8(samples) => ChunkData::U8(samples),
            DecodingResult::U16(samples) => ChunkData::U16(samples),
            _ => {
                return Err(CodecError::Unsupported(format!(
                    "subfile {} does not hold 8 or 16 bit unsigned samples",
                    subfile
                )))
            }
        };

        self.cache.put((subfile, index), chunk.clone());
        Ok(chunk)
    }

    /// Decode every finalized subfile into its on-disk chunk form.
    fn load_all(&mut self) -> Result<Vec<StoredSubfile>, CodecError> {
        let mut subfiles = Vec::with_capacity(self.directories.len() + 1);
        for subfile in 0..self.directories.len() {
            let tags = self.directories[subfile].clone();
            let grid =
                ChunkGrid::for_tags(&tags).map_err(|e| CodecError::Unsupported(e.to_string()))?;
            let mut chunks = Vec::with_capacity(grid.chunk_count() as usize);
            for index in 0..grid.chunk_count() {
                let chunk = self.read_chunk(subfile, index, grid.is_tiled())?;
                chunks.push(stored_chunk(&grid, index, chunk)?);
            }
            subfiles.push(StoredSubfile { tags, chunks });
        }
        Ok(subfiles)
    }

    /// Write `subfiles` to a sibling file and move it over the original.
    fn rewrite(&mut self, subfiles: &[StoredSubfile]) -> Result<(), CodecError> {
        let tmp = temp_sibling(&self.path);
        if let Err(e) = write_file(&tmp, self.version, subfiles) {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }

        // Release the read handle before replacing the file.
        self.decoder = None;
        fs::rename(&tmp, &self.path)?;
        self.cache.clear();

        info!(
            path = %self.path.display(),
            subfiles = subfiles.len(),
            "Rewrote TIFF file"
        );
        Ok(())
    }
}

impl TiffCodec for FileCodec {
    fn version(&self) -> TiffVersion {
        self.version
    }

    fn directories(&mut self) -> Result<Vec<TagSet>, CodecError> {
        Ok(self.directories.clone())
    }

    fn read_tile(&mut self, subfile: usize, tile: u32) -> Result<ChunkData, CodecError> {
        self.read_chunk(subfile, tile, true)
    }

    fn read_strip(&mut self, subfile: usize, strip: u32) -> Result<ChunkData, CodecError> {
        self.read_chunk(subfile, strip, false)
    }

    fn begin_subfile(&mut self, tags: &TagSet) -> Result<(), CodecError> {
        if self.pending.is_some() {
            return Err(CodecError::PendingSubfile);
        }
        if tags.compression != COMPRESSION_NONE {
            return Err(CodecError::Unsupported(format!(
                "only uncompressed subfiles can be written, got compression {}",
                tags.compression
            )));
        }
        if tags.samples_per_pixel != 1 || tags.planar_config != PLANAR_CONFIG_CONTIG {
            return Err(CodecError::Unsupported(
                "only single-sample contiguous subfiles can be written".to_string(),
            ));
        }
        if let Some(index) = self
            .directories
            .iter()
            .position(|t| t.compression != COMPRESSION_NONE)
        {
            return Err(CodecError::Unsupported(format!(
                "cannot append to a file holding compressed subfile {}",
                index
            )));
        }

        self.pending = Some(PendingChunks::new(tags)?);
        Ok(())
    }

    fn write_tile(&mut self, tile: u32, data: ChunkData) -> Result<(), CodecError> {
        self.pending
            .as_mut()
            .ok_or(CodecError::NoPendingSubfile)?
            .put(true, tile, data)
    }

    fn write_strip(&mut self, strip: u32, data: ChunkData) -> Result<(), CodecError> {
        self.pending
            .as_mut()
            .ok_or(CodecError::NoPendingSubfile)?
            .put(false, strip, data)
    }

    fn finalize_subfile(&mut self) -> Result<(), CodecError> {
        let pending = self.pending.take().ok_or(CodecError::NoPendingSubfile)?;
        let grid = *pending.grid();
        let (tags, chunks) = pending.into_parts()?;

        let mut subfiles = self.load_all()?;
        let chunks = chunks
            .into_iter()
            .enumerate()
            .map(|(index, chunk)| stored_chunk(&grid, index as u32, chunk))
            .collect::<Result<Vec<_>, _>>()?;
        subfiles.push(StoredSubfile {
            tags: tags.clone(),
            chunks,
        });

        self.rewrite(&subfiles)?;
        self.directories.push(tags);
        Ok(())
    }

    fn discard_subfile(&mut self) {
        if self.pending.take().is_some() {
            debug!(path = %self.path.display(), "Discarded pending subfile");
        }
    }

    fn flush(&mut self) -> Result<(), CodecError> {
        // Every finalized subfile is already on disk.
        debug!(path = %self.path.display(), "Flush");
        Ok(())
    }
}

// =============================================================================
// Header and tag reading
// =============================================================================

/// Read the version number from the file header.
fn read_version(path: &Path) -> Result<TiffVersion, CodecError> {
    let mut header = [0u8; 4];
    File::open(path)?.read_exact(&mut header)?;

    let order = [header[0], header[1]];
    let version = if order == BYTE_ORDER_LITTLE {
        u16::from_le_bytes([header[2], header[3]])
    } else if order == BYTE_ORDER_BIG {
        u16::from_be_bytes([header[2], header[3]])
    } else {
        return Err(CodecError::InvalidMagic(u16::from_be_bytes(order)));
    };
    TiffVersion::from_u16(version)
}

fn first_u16<R: Read + Seek>(decoder: &mut Decoder<R>, tag: Tag) -> Result<Option<u16>, CodecError> {
    Ok(decoder
        .find_tag_unsigned_vec::<u16>(tag)?
        .and_then(|values| values.first().copied()))
}

/// Tags of the decoder's current image, with TIFF defaults for absent tags.
fn read_tags<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<TagSet, CodecError> {
    let image_width = decoder
        .find_tag_unsigned::<u32>(Tag::ImageWidth)?
        .ok_or(CodecError::MissingTag("ImageWidth"))?;
    let image_height = decoder
        .find_tag_unsigned::<u32>(Tag::ImageLength)?
        .ok_or(CodecError::MissingTag("ImageLength"))?;
    let photometric = decoder
        .find_tag_unsigned::<u16>(Tag::PhotometricInterpretation)?
        .ok_or(CodecError::MissingTag("PhotometricInterpretation"))?;

    let bits_per_sample = first_u16(decoder, Tag::BitsPerSample)?.unwrap_or(1);
    let default_max = if bits_per_sample >= 16 {
        u16::MAX
    } else {
        ((1u32 << bits_per_sample) - 1) as u16
    };

    let tiled = decoder.find_tag(Tag::TileOffsets)?.is_some();
    let (tile_width, tile_height) = if tiled {
        (
            decoder
                .find_tag_unsigned::<u32>(Tag::TileWidth)?
                .ok_or(CodecError::MissingTag("TileWidth"))?,
            decoder
                .find_tag_unsigned::<u32>(Tag::TileLength)?
                .ok_or(CodecError::MissingTag("TileLength"))?,
        )
    } else {
        (0, 0)
    };

    let page = decoder
        .find_tag_unsigned_vec::<u16>(Tag::from_u16_exhaustive(PAGE_NUMBER_TAG))?
        .and_then(|values| match values.as_slice() {
            [number, count, ..] => Some(PageNumber {
                number: *number,
                count: *count,
            }),
            _ => None,
        });

    Ok(TagSet {
        subfile_kind: SubfileKind::from_bits(
            decoder
                .find_tag_unsigned::<u32>(Tag::NewSubfileType)?
                .unwrap_or(0),
        ),
        image_width,
        image_height,
        bits_per_sample,
        samples_per_pixel: decoder
            .find_tag_unsigned::<u16>(Tag::SamplesPerPixel)?
            .unwrap_or(1),
        compression: decoder
            .find_tag_unsigned::<u16>(Tag::Compression)?
            .unwrap_or(COMPRESSION_NONE),
        photometric,
        planar_config: decoder
            .find_tag_unsigned::<u16>(Tag::PlanarConfiguration)?
            .unwrap_or(PLANAR_CONFIG_CONTIG),
        sample_format: first_u16(decoder, Tag::SampleFormat)?.unwrap_or(SAMPLE_FORMAT_UINT),
        rows_per_strip: decoder
            .find_tag_unsigned::<u32>(Tag::RowsPerStrip)?
            .unwrap_or(ROWS_PER_STRIP_MAX),
        tile_width,
        tile_height,
        min_sample_value: first_u16(decoder, Tag::MinSampleValue)?.unwrap_or(0),
        max_sample_value: first_u16(decoder, Tag::MaxSampleValue)?.unwrap_or(default_max),
        page,
    })
}

// =============================================================================
// Writing
// =============================================================================

/// Bring a chunk into the size TIFF stores on disk.
///
/// Tiles are always full size, padded past the image edge. Strips hold only
/// the rows inside the image.
fn stored_chunk(grid: &ChunkGrid, index: u32, mut chunk: ChunkData) -> Result<ChunkData, CodecError> {
    let (data_height, data_width) = grid.chunk_data_dims(index);
    let data_len = data_height as usize * data_width as usize;

    if !grid.is_tiled() {
        if chunk.len() < data_len {
            return Err(CodecError::ChunkMismatch(format!(
                "strip {} holds {} samples, expected {}",
                index,
                chunk.len(),
                data_len
            )));
        }
        chunk.truncate(data_len);
        return Ok(chunk);
    }

    if chunk.len() == grid.chunk_len() {
        return Ok(chunk);
    }
    if chunk.len() != data_len {
        return Err(CodecError::ChunkMismatch(format!(
            "tile {} holds {} samples, expected {} or {}",
            index,
            chunk.len(),
            grid.chunk_len(),
            data_len
        )));
    }
    let dims = (data_height as usize, data_width as usize);
    Ok(match chunk {
        ChunkData::U8(samples) => ChunkData::U8(pad_tile(&samples, dims, grid)),
        ChunkData::U16(samples) => ChunkData::U16(pad_tile(&samples, dims, grid)),
    })
}

fn pad_tile<T: Copy + Default>(samples: &[T], (rows, cols): (usize, usize), grid: &ChunkGrid) -> Vec<T> {
    let stride = grid.chunk_width() as usize;
    let mut out = vec![T::default(); grid.chunk_len()];
    for r in 0..rows {
        out[r * stride..r * stride + cols].copy_from_slice(&samples[r * cols..(r + 1) * cols]);
    }
    out
}

/// Hidden sibling path used while rewriting `path`.
fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.rewrite", name))
}

fn write_file(path: &Path, version: TiffVersion, subfiles: &[StoredSubfile]) -> Result<(), CodecError> {
    let mut writer = BufWriter::new(File::create(path)?);
    match version {
        TiffVersion::Classic => write_subfiles(&mut TiffEncoder::new(&mut writer)?, subfiles)?,
        TiffVersion::Big => write_subfiles(&mut TiffEncoder::new_big(&mut writer)?, subfiles)?,
    }
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(())
}

fn write_subfiles<W, K>(encoder: &mut TiffEncoder<W, K>, subfiles: &[StoredSubfile]) -> Result<(), CodecError>
where
    W: Write + Seek,
    K: TiffKind,
{
    for subfile in subfiles {
        let tags = &subfile.tags;
        let mut dir = encoder.new_directory()?;

        let mut offsets = Vec::with_capacity(subfile.chunks.len());
        let mut byte_counts = Vec::with_capacity(subfile.chunks.len());
        for chunk in &subfile.chunks {
            let offset = match chunk {
                ChunkData::U8(samples) => dir.write_data(&samples[..])?,
                ChunkData::U16(samples) => dir.write_data(&samples[..])?,
            };
            offsets.push(K::convert_offset(offset)?);
            byte_counts.push(K::convert_offset(chunk.byte_len() as u64)?);
        }

        dir.write_tag(Tag::NewSubfileType, tags.subfile_kind.to_bits())?;
        dir.write_tag(Tag::ImageWidth, tags.image_width)?;
        dir.write_tag(Tag::ImageLength, tags.image_height)?;
        dir.write_tag(Tag::BitsPerSample, tags.bits_per_sample)?;
        dir.write_tag(Tag::Compression, tags.compression)?;
        dir.write_tag(Tag::PhotometricInterpretation, tags.photometric)?;
        dir.write_tag(Tag::SamplesPerPixel, tags.samples_per_pixel)?;
        dir.write_tag(Tag::PlanarConfiguration, tags.planar_config)?;
        dir.write_tag(Tag::SampleFormat, tags.sample_format)?;
        dir.write_tag(Tag::MinSampleValue, tags.min_sample_value)?;
        dir.write_tag(Tag::MaxSampleValue, tags.max_sample_value)?;
        if let Some(page) = tags.page {
            dir.write_tag(
                Tag::from_u16_exhaustive(PAGE_NUMBER_TAG),
                &[page.number, page.count][..],
            )?;
        }

        if tags.is_tiled() {
            dir.write_tag(Tag::TileWidth, tags.tile_width)?;
            dir.write_tag(Tag::TileLength, tags.tile_height)?;
            dir.write_tag(Tag::TileOffsets, K::convert_slice(&offsets))?;
            dir.write_tag(Tag::TileByteCounts, K::convert_slice(&byte_counts))?;
        } else {
            // The decoder sizes strips from this tag, so it never exceeds the image.
            dir.write_tag(Tag::RowsPerStrip, tags.rows_per_strip.min(tags.image_height))?;
            dir.write_tag(Tag::StripOffsets, K::convert_slice(&offsets))?;
            dir.write_tag(Tag::StripByteCounts, K::convert_slice(&byte_counts))?;
        }

        dir.finish()?;
    }
    Ok(())
}

use crate::codec::TiffCodec;
use crate::error::{CodecError, TiffError};
use crate::format::{SampleDepth, TagSet};
use crate::raster::{PixelBuffer, Raster, Sample};

use super::grid::{copy_block, ChunkGrid, Rect};

/// Read `rect` from a finalized subfile.
///
/// `rect` must already be validated against the subfile's dimensions. Fails
/// with [`TiffError::UnsupportedDepth`] when `T` does not match the subfile's
/// sample depth.
pub fn read_region<T, C>(
    codec: &mut C,
    subfile: usize,
    tags: &TagSet,
    rect: Rect,
) -> Result<Raster<T>, TiffError>
where
    T: Sample,
    C: TiffCodec + ?Sized,
{
    let depth = tags.sample_depth()?;
    if depth != T::DEPTH {
        return Err(TiffError::UnsupportedDepth {
            expected: T::DEPTH.label(),
            found: tags.bits_per_sample,
        });
    }

    let grid = ChunkGrid::for_tags(tags)?;
    let mut out = Raster::<T>::new(rect.width(), rect.height());
    let out_stride = rect.width() as usize;

    for span in grid.chunks_in(rect) {
        let chunk = if grid.is_tiled() {
            codec.read_tile(subfile, span.index)?
        } else {
            codec.read_strip(subfile, span.index)?
        };
        let samples = T::from_chunk(chunk)?;
        let stride = chunk_stride(&grid, subfile, span.index, samples.len())?;

        let overlap = span.overlap;
        copy_block(
            &samples,
            stride,
            (
                (overlap.y1 - span.origin_y) as usize,
                (overlap.x1 - span.origin_x) as usize,
            ),
            out.as_mut_slice(),
            out_stride,
            ((overlap.y1 - rect.y1) as usize, (overlap.x1 - rect.x1) as usize),
            overlap.height() as usize,
            overlap.width() as usize,
        );
    }

    Ok(out)
}

/// Read `rect` at whatever depth the subfile is stored in.
pub fn read_region_any<C>(
    codec: &mut C,
    subfile: usize,
    tags: &TagSet,
    rect: Rect,
) -> Result<PixelBuffer, TiffError>
where
    C: TiffCodec + ?Sized,
{
    match tags.sample_depth()? {
        SampleDepth::Eight => Ok(read_region::<u8, C>(codec, subfile, tags, rect)?.into()),
        SampleDepth::Sixteen => Ok(read_region::<u16, C>(codec, subfile, tags, rect)?.into()),
    }
}

/// Row stride of a chunk returned by the codec.
///
/// Codecs return either the full padded chunk or only its in-image part.
fn chunk_stride(
    grid: &ChunkGrid,
    subfile: usize,
    index: u32,
    len: usize,
) -> Result<usize, TiffError> {
    if len == grid.chunk_len() {
        return Ok(grid.chunk_width() as usize);
    }
    let (data_height, data_width) = grid.chunk_data_dims(index);
    if len == data_height as usize * data_width as usize {
        return Ok(data_width as usize);
    }
    Err(CodecError::ChunkMismatch(format!(
        "chunk {} of subfile {} holds {} samples, expected {} or {}",
        index,
        subfile,
        len,
        grid.chunk_len(),
        data_height as usize * data_width as usize
    ))
    .into())
}

//! The ordered, append-only list of subfiles in a container.
//!
//! Index `i` in the directory is subfile `i` in the file. Entries are added
//! when the container opens (by enumerating the codec) or when a pending
//! subfile is finished; they are never reordered or removed.
//!
//! # Geometry convention
//!
//! Image-level geometry (`image_width`, `image_height`, `tile_width`,
//! `tile_height`) is reported from the *second-to-last* entry, see
//! [`SubfileDirectory::canonical_index`]. Per-subfile geometry is available
//! through [`SubfileDirectory::tags`].

use crate::error::TiffError;

use super::tags::TagSet;

/// Resolve a possibly negative subfile index against `count` entries.
///
/// `-1` is the last entry, `-count` the first. Indices `>= count` or
/// `< -count` fail with [`TiffError::SubfileOutOfRange`].
pub fn wrap_index(index: isize, count: usize) -> Result<usize, TiffError> {
    let size = count as isize;
    if index < -size || index >= size {
        return Err(TiffError::SubfileOutOfRange { index, count });
    }
    Ok(index.rem_euclid(size) as usize)
}

/// Ordered subfile tags, owned by the container.
#[derive(Debug, Clone, Default)]
pub struct SubfileDirectory {
    entries: Vec<TagSet>,
}

impl SubfileDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory holding the given entries in file order.
    pub fn from_entries(entries: Vec<TagSet>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[TagSet] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &TagSet> {
        self.entries.iter()
    }

    /// Append a finalized subfile and return its index.
    pub(crate) fn push(&mut self, tags: TagSet) -> usize {
        self.entries.push(tags);
        self.entries.len() - 1
    }

    /// Tags of subfile `index` (no wrapping).
    pub fn get(&self, index: usize) -> Result<&TagSet, TiffError> {
        self.entries.get(index).ok_or(TiffError::SubfileOutOfRange {
            index: index as isize,
            count: self.entries.len(),
        })
    }

    /// Tags of subfile `index`, where negative indices count from the end.
    pub fn tags(&self, index: isize) -> Result<&TagSet, TiffError> {
        let index = wrap_index(index, self.entries.len())?;
        Ok(&self.entries[index])
    }

    /// Entry that answers image-level geometry queries.
    ///
    /// The last entry is treated as a sentinel, so the second-to-last entry
    /// (`len - 2`) is canonical. A single-entry directory uses its only
    /// entry; an empty one fails with [`TiffError::EmptyDirectory`].
    pub fn canonical_index(&self) -> Result<usize, TiffError> {
        match self.entries.len() {
            0 => Err(TiffError::EmptyDirectory),
            1 => Ok(0),
            len => Ok(len - 2),
        }
    }

    fn canonical(&self) -> Result<&TagSet, TiffError> {
        let index = self.canonical_index()?;
        Ok(&self.entries[index])
    }

    pub fn image_width(&self) -> Result<u32, TiffError> {
        Ok(self.canonical()?.image_width)
    }

    pub fn image_height(&self) -> Result<u32, TiffError> {
        Ok(self.canonical()?.image_height)
    }

    pub fn tile_width(&self) -> Result<u32, TiffError> {
        Ok(self.canonical()?.tile_width)
    }

    pub fn tile_height(&self) -> Result<u32, TiffError> {
        Ok(self.canonical()?.tile_height)
    }

    /// Number of subfiles.
    pub fn page_count(&self) -> usize {
        self.entries.len()
    }
}

use thiserror::Error;

/// Errors raised by the byte-level TIFF codec.
///
/// These wrap everything the container delegates: opening and enumerating
/// the file, reading and writing tiles or strips, and flushing directories.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Underlying file I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The TIFF encoder or decoder rejected the data
    #[error("TIFF codec error: {0}")]
    Tiff(#[from] tiff::TiffError),

    /// Invalid TIFF magic bytes (not II or MM)
    #[error("Invalid TIFF magic bytes: expected 0x4949 (II) or 0x4D4D (MM), got 0x{0:04X}")]
    InvalidMagic(u16),

    /// Invalid TIFF version number
    #[error("Invalid TIFF version: expected 42 (TIFF) or 43 (BigTIFF), got {0}")]
    InvalidVersion(u16),

    /// Required tag is missing from a directory
    #[error("Missing required tag: {0}")]
    MissingTag(&'static str),

    /// Subfile index not known to the codec
    #[error("Subfile {0} does not exist")]
    NoSuchSubfile(usize),

    /// Tile or strip index outside the subfile's chunk grid
    #[error("Chunk {chunk} does not exist in subfile {subfile}")]
    NoSuchChunk { subfile: usize, chunk: u32 },

    /// A write primitive was called without a subfile being open for writing
    #[error("No subfile is open for writing")]
    NoPendingSubfile,

    /// A subfile is already open for writing
    #[error("A subfile is already open for writing")]
    PendingSubfile,

    /// Chunk data does not match the pending subfile's layout or depth
    #[error("Chunk data mismatch: {0}")]
    ChunkMismatch(String),

    /// The codec cannot perform the requested operation
    #[error("Unsupported by codec: {0}")]
    Unsupported(String),
}

/// Errors surfaced by the container, region I/O, pyramid builder and crop engine.
#[derive(Debug, Error)]
pub enum TiffError {
    /// Underlying codec failure (open, read, write, flush)
    #[error("File error: {0}")]
    File(#[from] CodecError),

    /// Region coordinates out of bounds or inverted
    #[error(
        "Invalid region ({y1}, {x1})..({y2}, {x2}) for a {width}x{height} image"
    )]
    InvalidRegion {
        y1: i64,
        x1: i64,
        y2: i64,
        x2: i64,
        width: u32,
        height: u32,
    },

    /// Sample depth other than 8/16, or a call typed for the other depth
    #[error("Unsupported sample depth: {found} bits per sample (expected {expected})")]
    UnsupportedDepth { expected: &'static str, found: u16 },

    /// Attempt to rewrite an already finalized subfile
    #[error("Cannot alter existing subfile {0}: subfiles are immutable once written")]
    ImmutableSubfile(usize),

    /// Malformed tag combination or builder configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Subfile index outside the directory
    #[error("Subfile index {index} out of range for {count} subfile(s)")]
    SubfileOutOfRange { index: isize, count: usize },

    /// Geometry queried on a directory without entries
    #[error("The subfile directory is empty")]
    EmptyDirectory,

    /// Buffer dimensions disagree with the target rectangle
    #[error("Buffer is {actual_height}x{actual_width}, expected {expected_height}x{expected_width}")]
    BufferShape {
        expected_height: u32,
        expected_width: u32,
        actual_height: u32,
        actual_width: u32,
    },
}

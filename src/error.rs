use thiserror::Error;

/// Errors from the byte layer (random-access streams and the buffered
/// stream wrapping them).
#[derive(Debug, Clone, Error)]
pub enum StreamError {
    /// Error from the underlying storage (file system, in-memory store, ...)
    #[error("I/O error: {0}")]
    Io(String),

    /// Requested position exceeds stream bounds
    #[error("Position out of bounds: requested {requested} bytes at offset {offset}, size is {size}")]
    OutOfBounds {
        offset: u64,
        requested: u64,
        size: u64,
    },
}

/// Errors from the block layer (resolution editors, adapters, the cached
/// block editor).
#[derive(Debug, Clone, Error)]
pub enum BlockError {
    /// Generic I/O failure while reading or writing a block
    #[error("I/O error: {0}")]
    Io(String),

    /// Error from the byte layer underneath a block editor
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    /// Packet/codec mismatch (wrong codec for the editor, scanline buffer
    /// not growable, ...)
    #[error("Codec error: {0}")]
    Codec(String),

    /// Block origin does not fall inside the resolution
    #[error("Block origin ({x}, {y}) out of bounds for {width}x{height} resolution")]
    OutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },

    /// No adapter translates between the requested granularities
    #[error("No adapter presents {client:?} blocks over a {adapted:?} editor")]
    NoAdapter {
        client: crate::raster::Granularity,
        adapted: crate::raster::Granularity,
    },

    /// Cache-miss signal. Internal to the cached block editor: its public
    /// operations never return this variant.
    #[error("Block not present in cache")]
    NotFound,
}

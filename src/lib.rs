//! # Raster Blocks
//!
//! A block-granularity access layer for tiled raster resolutions.
//!
//! Raster editors and storage rarely agree on a block shape: a client wants
//! to address a resolution in scanlines, strips or one whole image while
//! the backing store keeps tiles, and a remote store is too slow to touch
//! on every access. This crate provides the pieces that bridge those gaps:
//!
//! - **Granularity adapters**: translate between scanline, strip, tile and
//!   whole-image block access, with exact partial-block arithmetic at the
//!   image edges.
//! - **Cached block editor**: a read-through/write-back cache composing a
//!   slow source editor with a fast local cache editor, tracking per-block
//!   state under a file-keyed monitor.
//! - **Buffered stream**: MRU-buffered byte-range reads and writes over any
//!   random-access stream, with opportunistic read-ahead for sequential
//!   access.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`raster`] - data model: descriptors, data flags, RLE packets, raster
//!   file handles and region locks
//! - [`editor`] - the `ResolutionEditor` trait, the granularity adapters,
//!   the cached editor and a stream-backed leaf editor
//! - [`io`] - the byte layer: `RandomAccessStream` and the buffered stream
//! - [`config`] - buffered-stream tuning knobs
//! - [`error`] - error types for both layers
//!
//! Every adapter and the cached editor present the same
//! [`editor::ResolutionEditor`] surface, so they compose transparently: a
//! client cannot tell a raw stream-backed editor from a cache or a
//! granularity adapter.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use raster_blocks::{
//!     create_adapter, AccessMode, AdapterContext, Granularity, MemoryStream,
//!     RasterFile, ResolutionDescriptor, ResolutionEditor, StreamBlockEditor,
//! };
//!
//! // Tile-granularity storage: 100x80 pixels, 32x16 tiles, 8-bit deep
//! let descriptor = Arc::new(ResolutionDescriptor::tile_layout(100, 80, 32, 16, 8));
//! let tiles = StreamBlockEditor::new(MemoryStream::new("mem://demo"), descriptor, 0);
//!
//! // Present the tile grid as strips of two tile rows
//! let context = AdapterContext {
//!     file: RasterFile::new("mem://demo", AccessMode::ReadWrite),
//!     strip_height: 32,
//! };
//! let mut strips = create_adapter(Granularity::Strip, Box::new(tiles), &context).unwrap();
//!
//! let mut block = vec![0u8; strips.descriptor().block_size_in_bytes()];
//! strips.read_block(0, 0, &mut block, None).unwrap();
//! assert!(block.iter().all(|b| *b == 0));
//! ```

pub mod config;
pub mod editor;
pub mod error;
pub mod io;
pub mod raster;

// Re-export commonly used types
pub use config::{
    StreamConfig, DEFAULT_BUFFER_LIMIT, DEFAULT_RATIO_ALLOC, DEFAULT_RATIO_DELETE,
};
pub use editor::{
    create_adapter, AdapterContext, AdapterEntry, CachedBlockEditor, LineToImage, LineToStrip,
    ResolutionEditor, StreamBlockEditor, TileToStrip, ADAPTER_TABLE,
};
pub use error::{BlockError, StreamError};
pub use io::{BufferedStream, FileStream, MemoryStream, RandomAccessStream};
pub use raster::{
    monitor_for, AccessMode, DataFlag, Granularity, Palette, RasterFile, RegionLock,
    ResolutionDescriptor, RleCodec, RlePacket, SharedDescriptor,
};

//! Resolution editors: block-granularity read/write capabilities.
//!
//! Every component in this module presents the same [`ResolutionEditor`]
//! surface, so adapters and caches compose transparently: a client cannot
//! distinguish a raw stream-backed editor from a granularity adapter or a
//! cached editor wrapping one.
//!
//! Adapters are looked up in a static table keyed by the (client, adapted)
//! granularity pair; [`create_adapter`] picks the right constructor for the
//! editor it is handed.

mod cached;
mod line_to_image;
mod line_to_strip;
mod stream_editor;
mod tile_to_strip;

use std::sync::Arc;

pub use cached::CachedBlockEditor;
pub use line_to_image::LineToImage;
pub use line_to_strip::LineToStrip;
pub use stream_editor::StreamBlockEditor;
pub use tile_to_strip::TileToStrip;

use crate::error::BlockError;
use crate::raster::{Granularity, Palette, RasterFile, RegionLock, RlePacket, SharedDescriptor};

// =============================================================================
// Editor Trait
// =============================================================================

/// The capability to read and write blocks of one resolution.
///
/// Raw operations move whole blocks through byte slices; the RLE variants
/// move per-scanline [`RlePacket`]s. The optional lock token lets a
/// composite caller hold one byte-range lock across several inner calls.
pub trait ResolutionEditor: Send {
    /// The descriptor of the resolution this editor addresses.
    fn descriptor(&self) -> SharedDescriptor;

    /// Read the block whose origin is pixel `(x, y)` into `block`.
    ///
    /// `block` must hold at least `descriptor().block_size_in_bytes()`
    /// bytes. Edge blocks are clipped against the image bounds: rows past
    /// the bottom are not touched by adapters and zero-filled by leaf
    /// editors.
    fn read_block(
        &mut self,
        x: u32,
        y: u32,
        block: &mut [u8],
        lock: Option<&RegionLock>,
    ) -> Result<(), BlockError>;

    /// Write the block whose origin is pixel `(x, y)` from `block`.
    fn write_block(
        &mut self,
        x: u32,
        y: u32,
        block: &[u8],
        lock: Option<&RegionLock>,
    ) -> Result<(), BlockError>;

    /// Read the block at `(x, y)` in RLE-packet form.
    fn read_block_rle(
        &mut self,
        x: u32,
        y: u32,
        packet: &mut RlePacket,
        lock: Option<&RegionLock>,
    ) -> Result<(), BlockError>;

    /// Write the block at `(x, y)` from RLE-packet form.
    fn write_block_rle(
        &mut self,
        x: u32,
        y: u32,
        packet: &RlePacket,
        lock: Option<&RegionLock>,
    ) -> Result<(), BlockError>;

    /// Apply a new palette to this editor and everything it decorates.
    fn set_palette(&mut self, palette: &Palette) -> Result<(), BlockError>;
}

// =============================================================================
// Adapter Factory
// =============================================================================

/// Construction context shared by all adapter constructors.
#[derive(Debug, Clone)]
pub struct AdapterContext {
    /// The raster file the adapted editor belongs to.
    pub file: Arc<RasterFile>,
    /// Client block height in rows, for strip-granularity clients.
    pub strip_height: u32,
}

type AdapterCtor =
    fn(Box<dyn ResolutionEditor>, &AdapterContext) -> Result<Box<dyn ResolutionEditor>, BlockError>;

/// One adapter capability: which client granularity it presents over which
/// adapted granularity.
pub struct AdapterEntry {
    pub client: Granularity,
    pub adapted: Granularity,
    ctor: AdapterCtor,
}

/// Every granularity translation the crate supports.
pub const ADAPTER_TABLE: &[AdapterEntry] = &[
    AdapterEntry {
        client: Granularity::Image,
        adapted: Granularity::Line,
        ctor: LineToImage::boxed,
    },
    AdapterEntry {
        client: Granularity::Strip,
        adapted: Granularity::Line,
        ctor: LineToStrip::boxed,
    },
    AdapterEntry {
        client: Granularity::Strip,
        adapted: Granularity::Tile,
        ctor: TileToStrip::boxed,
    },
];

/// Wrap `inner` in the adapter presenting `client`-granularity blocks.
///
/// The adapted granularity is taken from `inner`'s descriptor. Fails with
/// [`BlockError::NoAdapter`] when no table entry matches.
pub fn create_adapter(
    client: Granularity,
    inner: Box<dyn ResolutionEditor>,
    context: &AdapterContext,
) -> Result<Box<dyn ResolutionEditor>, BlockError> {
    let adapted = inner.descriptor().granularity();
    let entry = ADAPTER_TABLE
        .iter()
        .find(|e| e.client == client && e.adapted == adapted)
        .ok_or(BlockError::NoAdapter { client, adapted })?;
    (entry.ctor)(inner, context)
}

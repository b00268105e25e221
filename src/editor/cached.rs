//! Cached block editor: read-through/write-back caching over two editors.
//!
//! Composes a (slow, possibly remote) source editor with a (fast, local)
//! cache editor. Per-block [`DataFlag`]s on the cache's authoritative
//! descriptor record which blocks are populated; the client-visible logical
//! descriptor is resynchronized from it whenever they diverge.
//!
//! All flag transitions happen under the source file's monitor. The monitor
//! is deliberately released around the source read during population: the
//! source may live in another file with its own monitor, and holding both
//! at once would invite lock-order inversion. A reader therefore observes
//! either the pre- or post-population state of a block, never a torn one.

use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::error::BlockError;
use crate::raster::{
    DataFlag, Palette, RasterFile, RegionLock, RlePacket, SharedDescriptor,
};

use super::ResolutionEditor;

pub struct CachedBlockEditor {
    source: Box<dyn ResolutionEditor>,
    cache: Box<dyn ResolutionEditor>,
    source_file: Arc<RasterFile>,
    /// Client-visible descriptor; its flags mirror the cache's.
    logical: SharedDescriptor,
    /// The cache editor's descriptor: the authoritative flag array.
    cache_desc: SharedDescriptor,
    monitor: Arc<Mutex<()>>,
    scratch: Vec<u8>,
}

impl CachedBlockEditor {
    /// Compose `source` and `cache` behind one editor.
    ///
    /// `logical` is the descriptor handed to clients; it must share the
    /// cache descriptor's geometry. The monitor is keyed by `source_file`'s
    /// logical identity, so every editor opened over that file serializes
    /// its flag transitions with this one.
    pub fn new(
        source: Box<dyn ResolutionEditor>,
        cache: Box<dyn ResolutionEditor>,
        source_file: Arc<RasterFile>,
        logical: SharedDescriptor,
    ) -> Self {
        let cache_desc = cache.descriptor();
        debug_assert_eq!(logical.count_blocks(), cache_desc.count_blocks());
        debug_assert_eq!(logical.block_size_in_bytes(), cache_desc.block_size_in_bytes());
        let monitor = source_file.monitor();
        Self {
            source,
            cache,
            source_file,
            logical,
            cache_desc,
            monitor,
            scratch: Vec::new(),
        }
    }

    /// Mark block `index` populated, on both flag arrays.
    fn mark_loaded(&self, index: usize) {
        self.cache_desc.set_block_flag(index, DataFlag::Loaded);
        self.logical.set_block_flag(index, DataFlag::Loaded);
    }

    /// Flag transition after a successful client write.
    fn mark_written(&self, index: usize) {
        let next = match self.cache_desc.block_flag(index) {
            DataFlag::Empty => DataFlag::Loaded,
            DataFlag::Loaded | DataFlag::Overwritten => DataFlag::Overwritten,
        };
        self.cache_desc.set_block_flag(index, next);
        self.logical.set_block_flag(index, next);
    }

    /// Probe the cache under the monitor. Serves the block from the cache
    /// editor when its flag says it is present, and resyncs the logical
    /// flag array either way.
    fn try_cache_raw(
        &mut self,
        index: usize,
        x: u32,
        y: u32,
        block: &mut [u8],
        lock: Option<&RegionLock>,
    ) -> Result<bool, BlockError> {
        let monitor = Arc::clone(&self.monitor);
        let _guard = monitor.lock().unwrap();
        let found = if self.cache_desc.block_flag(index) != DataFlag::Empty {
            self.cache.read_block(x, y, block, lock)?;
            true
        } else {
            false
        };
        self.logical.sync_flags_from(&self.cache_desc);
        Ok(found)
    }

    fn try_cache_rle(
        &mut self,
        index: usize,
        x: u32,
        y: u32,
        packet: &mut RlePacket,
        lock: Option<&RegionLock>,
    ) -> Result<bool, BlockError> {
        let monitor = Arc::clone(&self.monitor);
        let _guard = monitor.lock().unwrap();
        let found = if self.cache_desc.block_flag(index) != DataFlag::Empty {
            self.cache.read_block_rle(x, y, packet, lock)?;
            true
        } else {
            false
        };
        self.logical.sync_flags_from(&self.cache_desc);
        Ok(found)
    }

    /// Fill `packet` with identity-codec scanlines over `raw`.
    fn degrade_to_identity(
        &self,
        y: u32,
        raw: &[u8],
        packet: &mut RlePacket,
    ) -> Result<(), BlockError> {
        let rows = self.cache_desc.rows_in_block_at(y) as usize;
        let row_bytes = self.cache_desc.bytes_per_block_row();
        packet.set_codec(crate::raster::RleCodec::Identity);
        for r in 0..rows {
            packet.set_scanline(r, &raw[r * row_bytes..(r + 1) * row_bytes])?;
        }
        Ok(())
    }
}

impl ResolutionEditor for CachedBlockEditor {
    fn descriptor(&self) -> SharedDescriptor {
        Arc::clone(&self.logical)
    }

    fn read_block(
        &mut self,
        x: u32,
        y: u32,
        block: &mut [u8],
        lock: Option<&RegionLock>,
    ) -> Result<(), BlockError> {
        let index = self.cache_desc.block_index(x, y);
        if self.try_cache_raw(index, x, y, block, lock)? {
            return Ok(());
        }

        // A source opened for creation or export has nothing to read yet;
        // the block is blank.
        if self.source_file.access_mode().is_authoring() {
            block[..self.cache_desc.block_size_in_bytes()].fill(0);
            return Ok(());
        }

        // Population. The monitor stays released across the source read: the
        // source lives in its own file whose I/O may take other locks.
        self.source.read_block(x, y, block, lock)?;

        let monitor = Arc::clone(&self.monitor);
        let _guard = monitor.lock().unwrap();
        match self.cache.write_block(x, y, block, None) {
            Ok(()) => {
                self.mark_loaded(index);
                debug!(x, y, "block populated from source");
            }
            // The data read from the source is still good; only the cache
            // missed out.
            Err(err) => warn!(%err, x, y, "cache population failed, serving source data"),
        }
        Ok(())
    }

    fn write_block(
        &mut self,
        x: u32,
        y: u32,
        block: &[u8],
        lock: Option<&RegionLock>,
    ) -> Result<(), BlockError> {
        let index = self.cache_desc.block_index(x, y);
        let monitor = Arc::clone(&self.monitor);
        let _guard = monitor.lock().unwrap();
        // Writes land in the cache only; the source is never written.
        self.cache.write_block(x, y, block, lock)?;
        self.mark_written(index);
        Ok(())
    }

    fn read_block_rle(
        &mut self,
        x: u32,
        y: u32,
        packet: &mut RlePacket,
        lock: Option<&RegionLock>,
    ) -> Result<(), BlockError> {
        let index = self.cache_desc.block_index(x, y);
        if self.try_cache_rle(index, x, y, packet, lock)? {
            return Ok(());
        }

        let size = self.cache_desc.block_size_in_bytes();
        if self.scratch.len() < size {
            self.scratch.resize(size, 0);
        }

        if self.source_file.access_mode().is_authoring() {
            self.scratch[..size].fill(0);
            let scratch = std::mem::take(&mut self.scratch);
            let result = self.degrade_to_identity(y, &scratch[..size], packet);
            self.scratch = scratch;
            return result;
        }

        // Populate from a raw source read, monitor released meanwhile.
        let mut scratch = std::mem::take(&mut self.scratch);
        let read = self.source.read_block(x, y, &mut scratch[..size], lock);
        if let Err(err) = read {
            self.scratch = scratch;
            return Err(err);
        }

        let monitor = Arc::clone(&self.monitor);
        let guard = monitor.lock().unwrap();
        let result = match self.cache.write_block(x, y, &scratch[..size], None) {
            Ok(()) => {
                self.mark_loaded(index);
                // Re-read through the cache editor to obtain the block in
                // its compressed form.
                match self.cache.read_block_rle(x, y, packet, lock) {
                    Ok(()) => Ok(()),
                    Err(err) => {
                        warn!(%err, x, y, "compressed re-read failed, serving identity packet");
                        self.degrade_to_identity(y, &scratch[..size], packet)
                    }
                }
            }
            Err(err) => {
                // Degrade to an uncompressed packet over the bytes we
                // already have rather than failing the call.
                warn!(%err, x, y, "cache population failed, serving identity packet");
                self.degrade_to_identity(y, &scratch[..size], packet)
            }
        };
        drop(guard);
        self.scratch = scratch;
        result
    }

    fn write_block_rle(
        &mut self,
        x: u32,
        y: u32,
        packet: &RlePacket,
        lock: Option<&RegionLock>,
    ) -> Result<(), BlockError> {
        let index = self.cache_desc.block_index(x, y);
        let monitor = Arc::clone(&self.monitor);
        let _guard = monitor.lock().unwrap();
        self.cache.write_block_rle(x, y, packet, lock)?;
        self.mark_written(index);
        Ok(())
    }

    fn set_palette(&mut self, palette: &Palette) -> Result<(), BlockError> {
        let monitor = Arc::clone(&self.monitor);
        let _guard = monitor.lock().unwrap();
        self.source.set_palette(palette)?;
        self.cache.set_palette(palette)
    }
}

impl Drop for CachedBlockEditor {
    fn drop(&mut self) {
        if !self.logical.palette_has_changed() {
            return;
        }
        let Some(palette) = self.logical.palette() else {
            return;
        };
        let monitor = Arc::clone(&self.monitor);
        let _guard = monitor.lock().unwrap();
        if let Err(err) = self.source.set_palette(&palette) {
            warn!(%err, "palette propagation to source failed on teardown");
        }
        if let Err(err) = self.cache.set_palette(&palette) {
            warn!(%err, "palette propagation to cache failed on teardown");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

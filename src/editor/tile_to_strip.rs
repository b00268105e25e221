//! Tile→Strip adapter: tile-grid storage presented as full-width strips.

use std::sync::Arc;

use tracing::warn;

use crate::error::BlockError;
use crate::raster::{
    Granularity, Palette, RasterFile, RegionLock, RleCodec, RlePacket, SharedDescriptor,
};

use super::{AdapterContext, ResolutionEditor};

/// Presents strip-granularity blocks over a tile-grid editor.
///
/// The client strip height is an integer multiple of the tile height and a
/// strip spans every tile column. Reads assemble the strip tile by tile
/// through a reusable tile-sized scratch buffer; writes slice the strip
/// back into tiles, zero-padding the scratch for the narrower rightmost
/// column and for an incomplete final tile row.
///
/// Both directions run under one shared region lock so the multi-tile
/// operation is observed atomically by cooperating readers; when the caller
/// does not supply a token, one is acquired for the whole composite call.
pub struct TileToStrip {
    inner: Box<dyn ResolutionEditor>,
    descriptor: SharedDescriptor,
    file: Arc<RasterFile>,
    tile_width: u32,
    tile_height: u32,
    tiles_per_block: u32,
    tiles_per_width: u32,
    /// Exact byte width of one full tile column.
    tile_row_bytes: usize,
    /// Byte width of the (possibly narrower) rightmost column.
    right_col_bytes: usize,
    /// Byte width of one full strip row.
    strip_stride: usize,
    tile_scratch: Vec<u8>,
    strip_scratch: Vec<u8>,
}

impl TileToStrip {
    pub fn new(
        inner: Box<dyn ResolutionEditor>,
        file: Arc<RasterFile>,
        tiles_per_block: u32,
    ) -> Self {
        let adapted = inner.descriptor();
        debug_assert_eq!(adapted.granularity(), Granularity::Tile);
        debug_assert!(tiles_per_block > 0);
        debug_assert_eq!(
            (adapted.block_width() * adapted.bits_per_pixel()) % 8,
            0,
            "tile columns must fall on byte boundaries"
        );

        let tile_width = adapted.block_width();
        let tile_height = adapted.block_height();
        let descriptor = Arc::new(adapted.with_geometry(
            adapted.width(),
            tiles_per_block * tile_height,
            Granularity::Strip,
        ));

        let tiles_per_width = adapted.blocks_per_width();
        let tile_row_bytes = adapted.bytes_per_block_row();
        let right_col_px = adapted.width() - (tiles_per_width - 1) * tile_width;
        let right_col_bytes = adapted.row_bytes(right_col_px);
        let strip_stride = descriptor.bytes_per_block_row();
        let tile_scratch = vec![0; adapted.block_size_in_bytes()];

        Self {
            inner,
            descriptor,
            file,
            tile_width,
            tile_height,
            tiles_per_block,
            tiles_per_width,
            tile_row_bytes,
            right_col_bytes,
            strip_stride,
            tile_scratch,
            strip_scratch: Vec::new(),
        }
    }

    pub(super) fn boxed(
        inner: Box<dyn ResolutionEditor>,
        context: &AdapterContext,
    ) -> Result<Box<dyn ResolutionEditor>, BlockError> {
        let tile_height = inner.descriptor().block_height();
        if context.strip_height == 0 || context.strip_height % tile_height != 0 {
            debug_assert!(false, "strip height must be a multiple of the tile height");
            return Err(BlockError::Codec(format!(
                "strip height {} is not a multiple of tile height {}",
                context.strip_height, tile_height
            )));
        }
        Ok(Box::new(Self::new(
            inner,
            Arc::clone(&context.file),
            context.strip_height / tile_height,
        )))
    }

    fn col_bytes(&self, col: u32) -> usize {
        if col + 1 == self.tiles_per_width {
            self.right_col_bytes
        } else {
            self.tile_row_bytes
        }
    }

    /// Assemble the strip at row `y` from per-tile reads.
    fn read_strip(&mut self, y: u32, block: &mut [u8], lock: &RegionLock) -> Result<(), BlockError> {
        let height = self.descriptor.height();
        for col in 0..self.tiles_per_width {
            let col_bytes = self.col_bytes(col);
            let col_offset = col as usize * self.tile_row_bytes;
            for tile_row in 0..self.tiles_per_block {
                let ty = y + tile_row * self.tile_height;
                if ty >= height {
                    break;
                }
                let rows = self.tile_height.min(height - ty) as usize;
                self.inner
                    .read_block(col * self.tile_width, ty, &mut self.tile_scratch, Some(lock))?;
                for r in 0..rows {
                    let src = r * self.tile_row_bytes;
                    let dst = ((tile_row * self.tile_height) as usize + r) * self.strip_stride
                        + col_offset;
                    block[dst..dst + col_bytes]
                        .copy_from_slice(&self.tile_scratch[src..src + col_bytes]);
                }
            }
        }
        // Rows past the image bottom read as zero.
        let filled = self.strip_rows_at(y) * self.strip_stride;
        let end = block
            .len()
            .min((self.tiles_per_block * self.tile_height) as usize * self.strip_stride);
        if filled < end {
            block[filled..end].fill(0);
        }
        Ok(())
    }

    /// Slice the strip at row `y` back into tile writes.
    fn write_tiles(&mut self, y: u32, block: &[u8], lock: &RegionLock) -> Result<(), BlockError> {
        let height = self.descriptor.height();
        for col in 0..self.tiles_per_width {
            let col_bytes = self.col_bytes(col);
            let col_offset = col as usize * self.tile_row_bytes;
            for tile_row in 0..self.tiles_per_block {
                let ty = y + tile_row * self.tile_height;
                if ty >= height {
                    break;
                }
                let rows = self.tile_height.min(height - ty) as usize;
                if col_bytes < self.tile_row_bytes || rows < self.tile_height as usize {
                    self.tile_scratch.fill(0);
                }
                for r in 0..rows {
                    let src = ((tile_row * self.tile_height) as usize + r) * self.strip_stride
                        + col_offset;
                    let dst = r * self.tile_row_bytes;
                    self.tile_scratch[dst..dst + col_bytes]
                        .copy_from_slice(&block[src..src + col_bytes]);
                }
                self.inner
                    .write_block(col * self.tile_width, ty, &self.tile_scratch, Some(lock))?;
            }
        }
        Ok(())
    }

    fn strip_rows_at(&self, y: u32) -> usize {
        (self.tiles_per_block * self.tile_height).min(self.descriptor.height() - y) as usize
    }
}

impl ResolutionEditor for TileToStrip {
    fn descriptor(&self) -> SharedDescriptor {
        Arc::clone(&self.descriptor)
    }

    fn read_block(
        &mut self,
        x: u32,
        y: u32,
        block: &mut [u8],
        lock: Option<&RegionLock>,
    ) -> Result<(), BlockError> {
        debug_assert_eq!(x, 0);
        debug_assert!(y < self.descriptor.height());
        let acquired;
        let lock = match lock {
            Some(token) => token,
            None => {
                acquired = self.file.lock_region(0, u64::MAX, true);
                &acquired
            }
        };
        self.read_strip(y, block, lock)
    }

    fn write_block(
        &mut self,
        x: u32,
        y: u32,
        block: &[u8],
        lock: Option<&RegionLock>,
    ) -> Result<(), BlockError> {
        debug_assert_eq!(x, 0);
        debug_assert!(y < self.descriptor.height());
        let acquired;
        let lock = match lock {
            Some(token) => token,
            None => {
                acquired = self.file.lock_region(0, u64::MAX, true);
                &acquired
            }
        };
        let result = self.write_tiles(y, block, lock);
        // Signal the edit to cooperating observers. Runs after the loop
        // whether or not it completed.
        self.file.sharing_control_increment();
        result
    }

    fn read_block_rle(
        &mut self,
        x: u32,
        y: u32,
        packet: &mut RlePacket,
        lock: Option<&RegionLock>,
    ) -> Result<(), BlockError> {
        debug_assert_eq!(x, 0);
        debug_assert!(y < self.descriptor.height());
        debug_assert!(packet.owns_buffers(), "destination must own its buffers");
        let acquired;
        let lock = match lock {
            Some(token) => token,
            None => {
                acquired = self.file.lock_region(0, u64::MAX, true);
                &acquired
            }
        };

        let size = self.descriptor.block_size_in_bytes();
        let mut scratch = std::mem::take(&mut self.strip_scratch);
        if scratch.len() < size {
            scratch.resize(size, 0);
        }
        let result = self.read_strip(y, &mut scratch[..size], lock).and_then(|()| {
            let rows = self.strip_rows_at(y);
            debug_assert!(packet.lines() >= rows);
            packet.set_codec(RleCodec::Identity);
            for r in 0..rows {
                packet.set_scanline(
                    r,
                    &scratch[r * self.strip_stride..(r + 1) * self.strip_stride],
                )?;
            }
            Ok(())
        });
        self.strip_scratch = scratch;
        result
    }

    fn write_block_rle(
        &mut self,
        x: u32,
        y: u32,
        packet: &RlePacket,
        lock: Option<&RegionLock>,
    ) -> Result<(), BlockError> {
        debug_assert_eq!(x, 0);
        debug_assert!(y < self.descriptor.height());
        debug_assert_eq!(packet.codec(), RleCodec::Identity);
        if packet.codec() != RleCodec::Identity {
            return Err(BlockError::Codec(
                "tile strips carry raw scanlines and accept identity packets only".to_string(),
            ));
        }
        let acquired;
        let lock = match lock {
            Some(token) => token,
            None => {
                acquired = self.file.lock_region(0, u64::MAX, true);
                &acquired
            }
        };

        let size = self.descriptor.block_size_in_bytes();
        let rows = self.strip_rows_at(y);
        debug_assert!(packet.lines() >= rows);

        let mut scratch = std::mem::take(&mut self.strip_scratch);
        if scratch.len() < size {
            scratch.resize(size, 0);
        }
        scratch[..size].fill(0);
        for r in 0..rows {
            let line = packet.scanline(r);
            let n = line.len().min(self.strip_stride);
            scratch[r * self.strip_stride..r * self.strip_stride + n]
                .copy_from_slice(&line[..n]);
        }

        let result = self.write_tiles(y, &scratch[..size], lock);
        self.strip_scratch = scratch;
        self.file.sharing_control_increment();
        result
    }

    fn set_palette(&mut self, palette: &Palette) -> Result<(), BlockError> {
        self.inner.set_palette(palette)
    }
}

impl Drop for TileToStrip {
    fn drop(&mut self) {
        if self.descriptor.palette_has_changed() {
            if let Some(palette) = self.descriptor.palette() {
                if let Err(err) = self.inner.set_palette(&palette) {
                    warn!(%err, "palette propagation failed on adapter teardown");
                }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

//! Line→Strip adapter: multi-line strips over a per-scanline editor.

use std::sync::Arc;

use tracing::warn;

use crate::error::BlockError;
use crate::raster::{Granularity, Palette, RegionLock, RleCodec, RlePacket, SharedDescriptor};

use super::{AdapterContext, ResolutionEditor};

/// Presents strip-granularity blocks over a per-scanline editor.
///
/// Each request decomposes into `min(strip_height, height - y)` single-line
/// calls. Raw reads are lenient: once at least one line has been read, a
/// failure zero-fills the remaining lines and the call reports success, so
/// a tile touching a partially-unreadable strip is still usable. A failure
/// on the very first line is a real error. Writes, and the RLE read path,
/// abort on the first failing line.
pub struct LineToStrip {
    inner: Box<dyn ResolutionEditor>,
    descriptor: SharedDescriptor,
    strip_height: u32,
    /// Reusable single-line RLE packet, sized for the worst case.
    scratch: RlePacket,
}

impl LineToStrip {
    pub fn new(inner: Box<dyn ResolutionEditor>, strip_height: u32) -> Self {
        let adapted = inner.descriptor();
        debug_assert_eq!(adapted.granularity(), Granularity::Line);
        debug_assert!(strip_height > 0);
        // Effective strip height is clamped at the image bottom.
        let strip_height = strip_height.min(adapted.height());
        let descriptor = Arc::new(adapted.with_geometry(
            adapted.width(),
            strip_height,
            Granularity::Strip,
        ));
        let scratch = RlePacket::single_line_worst_case(adapted.width(), RleCodec::PackBits);
        Self {
            inner,
            descriptor,
            strip_height,
            scratch,
        }
    }

    pub(super) fn boxed(
        inner: Box<dyn ResolutionEditor>,
        context: &AdapterContext,
    ) -> Result<Box<dyn ResolutionEditor>, BlockError> {
        Ok(Box::new(Self::new(inner, context.strip_height)))
    }

    /// Lines covered by the strip at row `y`, clipped at the image bottom.
    fn lines_at(&self, y: u32) -> u32 {
        self.strip_height.min(self.descriptor.height() - y)
    }
}

impl ResolutionEditor for LineToStrip {
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
        let lines = self.lines_at(y);
        let stride = self.descriptor.bytes_per_block_row();
        debug_assert!(block.len() >= stride * lines as usize);
        let end = block.len().min(stride * self.strip_height as usize);

        let mut offset = 0;
        for i in 0..lines {
            match self
                .inner
                .read_block(0, y + i, &mut block[offset..offset + stride], lock)
            {
                Ok(()) => offset += stride,
                Err(err) if i > 0 => {
                    // Keep the lines already read; blank the rest.
                    warn!(%err, row = y + i, "partial strip read, zero-filling remaining lines");
                    block[offset..end].fill(0);
                    return Ok(());
                }
                Err(err) => return Err(err),
            }
        }
        // Rows past the image bottom read as zero.
        if offset < end {
            block[offset..end].fill(0);
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
        debug_assert_eq!(x, 0);
        debug_assert!(y < self.descriptor.height());
        let lines = self.lines_at(y);
        let stride = self.descriptor.bytes_per_block_row();
        debug_assert!(block.len() >= stride * lines as usize);

        let mut offset = 0;
        for i in 0..lines {
            self.inner
                .write_block(0, y + i, &block[offset..offset + stride], lock)?;
            offset += stride;
        }
        Ok(())
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
        let lines = self.lines_at(y);
        debug_assert!(packet.lines() >= lines as usize);
        debug_assert!(packet.owns_buffers(), "destination must own its buffers");

        for i in 0..lines {
            self.scratch.set_scanline_len(0, 0);
            self.inner
                .read_block_rle(0, y + i, &mut self.scratch, lock)?;
            packet.set_scanline(i as usize, self.scratch.scanline(0))?;
        }
        packet.set_codec(self.scratch.codec());
        Ok(())
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
        let lines = self.lines_at(y);
        debug_assert!(packet.lines() >= lines as usize);

        self.scratch.set_codec(packet.codec());
        for i in 0..lines {
            self.scratch.set_scanline(0, packet.scanline(i as usize))?;
            self.inner.write_block_rle(0, y + i, &self.scratch, lock)?;
        }
        Ok(())
    }

    fn set_palette(&mut self, palette: &Palette) -> Result<(), BlockError> {
        self.inner.set_palette(palette)
    }
}

impl Drop for LineToStrip {
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

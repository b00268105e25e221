//! Line→Image adapter: the whole image as one client block.

use std::sync::Arc;

use tracing::warn;

use crate::error::BlockError;
use crate::raster::{Granularity, Palette, RegionLock, RleCodec, RlePacket, SharedDescriptor};

use super::{AdapterContext, ResolutionEditor};

/// Presents a single image-sized block over a per-scanline editor.
///
/// Reads and writes issue one single-line call per row, advancing through
/// the client buffer by the row stride; the first failing row aborts the
/// call and its status is returned.
pub struct LineToImage {
    inner: Box<dyn ResolutionEditor>,
    descriptor: SharedDescriptor,
    /// Reusable single-line RLE packet, sized for the worst case.
    scratch: RlePacket,
}

impl LineToImage {
    pub fn new(inner: Box<dyn ResolutionEditor>) -> Self {
        let adapted = inner.descriptor();
        debug_assert_eq!(adapted.granularity(), Granularity::Line);
        let descriptor = Arc::new(adapted.with_geometry(
            adapted.width(),
            adapted.height(),
            Granularity::Image,
        ));
        let scratch = RlePacket::single_line_worst_case(adapted.width(), RleCodec::PackBits);
        Self {
            inner,
            descriptor,
            scratch,
        }
    }

    pub(super) fn boxed(
        inner: Box<dyn ResolutionEditor>,
        _context: &AdapterContext,
    ) -> Result<Box<dyn ResolutionEditor>, BlockError> {
        Ok(Box::new(Self::new(inner)))
    }
}

impl ResolutionEditor for LineToImage {
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
        debug_assert_eq!((x, y), (0, 0), "the image is a single block");
        let stride = self.descriptor.bytes_per_block_row();
        debug_assert!(block.len() >= stride * self.descriptor.height() as usize);

        let mut offset = 0;
        for row in 0..self.descriptor.height() {
            self.inner
                .read_block(0, row, &mut block[offset..offset + stride], lock)?;
            offset += stride;
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
        debug_assert_eq!((x, y), (0, 0));
        let stride = self.descriptor.bytes_per_block_row();
        debug_assert!(block.len() >= stride * self.descriptor.height() as usize);

        let mut offset = 0;
        for row in 0..self.descriptor.height() {
            self.inner
                .write_block(0, row, &block[offset..offset + stride], lock)?;
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
        debug_assert_eq!((x, y), (0, 0));
        debug_assert!(packet.lines() >= self.descriptor.height() as usize);
        debug_assert!(packet.owns_buffers(), "destination must own its buffers");

        for row in 0..self.descriptor.height() {
            self.scratch.set_scanline_len(0, 0);
            self.inner.read_block_rle(0, row, &mut self.scratch, lock)?;
            // Grows the destination scanline when the decoded size exceeds
            // its current capacity.
            packet.set_scanline(row as usize, self.scratch.scanline(0))?;
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
        debug_assert_eq!((x, y), (0, 0));
        debug_assert!(packet.lines() >= self.descriptor.height() as usize);

        self.scratch.set_codec(packet.codec());
        for row in 0..self.descriptor.height() {
            self.scratch.set_scanline(0, packet.scanline(row as usize))?;
            self.inner.write_block_rle(0, row, &self.scratch, lock)?;
        }
        Ok(())
    }

    fn set_palette(&mut self, palette: &Palette) -> Result<(), BlockError> {
        self.inner.set_palette(palette)
    }
}

impl Drop for LineToImage {
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

//! Stream-backed leaf editor.
//!
//! [`StreamBlockEditor`] is the editor the adapters and caches ultimately
//! decorate: uncompressed blocks stored row-major at fixed offsets in a
//! [`RandomAccessStream`]. Reads past the written extent zero-fill, so a
//! freshly created store serves blank blocks. RLE operations carry raw
//! scanlines under the identity codec; real codecs belong to the container
//! plugin that owns the file format.

use std::sync::Arc;

use crate::error::BlockError;
use crate::io::RandomAccessStream;
use crate::raster::{Palette, RegionLock, RleCodec, RlePacket, SharedDescriptor};

use super::ResolutionEditor;

pub struct StreamBlockEditor<S: RandomAccessStream> {
    stream: S,
    descriptor: SharedDescriptor,
    base_offset: u64,
    scratch: Vec<u8>,
}

impl<S: RandomAccessStream> StreamBlockEditor<S> {
    /// Editor over `stream`, with block slots starting at `base_offset`.
    pub fn new(stream: S, descriptor: SharedDescriptor, base_offset: u64) -> Self {
        Self {
            stream,
            descriptor,
            base_offset,
            scratch: Vec::new(),
        }
    }

    pub fn stream(&self) -> &S {
        &self.stream
    }

    fn block_offset(&self, x: u32, y: u32) -> u64 {
        let index = self.descriptor.block_index(x, y) as u64;
        self.base_offset + index * self.descriptor.block_size_in_bytes() as u64
    }

    /// Read the full block slot at `(x, y)` into `out`, zero-filling
    /// whatever lies past the stream's end.
    fn read_slot(&mut self, x: u32, y: u32, out: &mut [u8]) -> Result<(), BlockError> {
        let size = self.descriptor.block_size_in_bytes();
        debug_assert!(out.len() >= size);
        self.stream.seek_to(self.block_offset(x, y))?;
        let mut total = 0;
        while total < size {
            let n = self.stream.read(&mut out[total..size])?;
            if n == 0 {
                break;
            }
            total += n;
        }
        out[total..size].fill(0);
        Ok(())
    }

    /// Read the full block slot at `(x, y)` into the instance scratch.
    fn load_scratch(&mut self, x: u32, y: u32) -> Result<(), BlockError> {
        let size = self.descriptor.block_size_in_bytes();
        if self.scratch.len() < size {
            self.scratch.resize(size, 0);
        }
        self.stream.seek_to(self.block_offset(x, y))?;
        let mut total = 0;
        while total < size {
            let n = self.stream.read(&mut self.scratch[total..size])?;
            if n == 0 {
                break;
            }
            total += n;
        }
        self.scratch[total..size].fill(0);
        Ok(())
    }
}

impl<S: RandomAccessStream> ResolutionEditor for StreamBlockEditor<S> {
    fn descriptor(&self) -> SharedDescriptor {
        Arc::clone(&self.descriptor)
    }

    fn read_block(
        &mut self,
        x: u32,
        y: u32,
        block: &mut [u8],
        _lock: Option<&RegionLock>,
    ) -> Result<(), BlockError> {
        self.read_slot(x, y, block)
    }

    fn write_block(
        &mut self,
        x: u32,
        y: u32,
        block: &[u8],
        _lock: Option<&RegionLock>,
    ) -> Result<(), BlockError> {
        let size = self.descriptor.block_size_in_bytes();
        debug_assert!(block.len() >= size);
        self.stream.seek_to(self.block_offset(x, y))?;
        self.stream.write(&block[..size])?;
        Ok(())
    }

    fn read_block_rle(
        &mut self,
        x: u32,
        y: u32,
        packet: &mut RlePacket,
        _lock: Option<&RegionLock>,
    ) -> Result<(), BlockError> {
        self.load_scratch(x, y)?;
        let rows = self.descriptor.rows_in_block_at(y) as usize;
        let row_bytes = self.descriptor.bytes_per_block_row();
        debug_assert!(packet.lines() >= rows);
        packet.set_codec(RleCodec::Identity);
        for r in 0..rows {
            packet.set_scanline(r, &self.scratch[r * row_bytes..(r + 1) * row_bytes])?;
        }
        Ok(())
    }

    fn write_block_rle(
        &mut self,
        x: u32,
        y: u32,
        packet: &RlePacket,
        _lock: Option<&RegionLock>,
    ) -> Result<(), BlockError> {
        debug_assert_eq!(packet.codec(), RleCodec::Identity);
        if packet.codec() != RleCodec::Identity {
            return Err(BlockError::Codec(
                "stream editor stores raw blocks and accepts identity packets only".to_string(),
            ));
        }
        let size = self.descriptor.block_size_in_bytes();
        let rows = self.descriptor.rows_in_block_at(y) as usize;
        let row_bytes = self.descriptor.bytes_per_block_row();
        debug_assert!(packet.lines() >= rows);

        if self.scratch.len() < size {
            self.scratch.resize(size, 0);
        }
        self.scratch[..size].fill(0);
        for r in 0..rows {
            let line = packet.scanline(r);
            debug_assert_eq!(line.len(), row_bytes);
            let n = line.len().min(row_bytes);
            self.scratch[r * row_bytes..r * row_bytes + n].copy_from_slice(&line[..n]);
        }
        self.stream.seek_to(self.block_offset(x, y))?;
        let scratch = &self.scratch[..size];
        self.stream.write(scratch)?;
        Ok(())
    }

    fn set_palette(&mut self, palette: &Palette) -> Result<(), BlockError> {
        self.descriptor.set_palette(palette.clone());
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

//! RLE packets: per-scanline compressed block buffers.
//!
//! An [`RlePacket`] carries one compressed sub-buffer per scanline of a
//! block, each with its own capacity and used size. The packet does not
//! encode or decode anything itself; the codec tag records which scheme the
//! scanline bytes are in, and the identity codec carries raw rows untouched
//! so a packet can always fall back to uncompressed content.

use crate::error::BlockError;

/// Compression scheme tag for the scanline buffers of a packet.
///
/// Encode/decode math lives with the file plugin that produced the bytes;
/// this layer only routes buffers. `Identity` means the scanline bytes are
/// the raw pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RleCodec {
    /// Uncompressed scanlines
    Identity,
    /// Run-length packet encoding, 16-bit units
    PackBits,
}

/// One compressed scanline: a buffer with fixed capacity and a used prefix.
#[derive(Debug, Clone)]
struct RleScanline {
    buf: Vec<u8>,
    used: usize,
}

/// A per-scanline RLE block buffer.
///
/// The ownership flag governs reallocation: a packet that owns its buffers
/// may grow a scanline when decoded data exceeds its capacity; a packet
/// over fixed (caller-provided) buffers may not. Writing past a fixed
/// buffer's capacity is a contract violation.
#[derive(Debug, Clone)]
pub struct RlePacket {
    scanlines: Vec<RleScanline>,
    owns_buffers: bool,
    codec: RleCodec,
}

impl RlePacket {
    /// Worst-case byte capacity of one RLE scanline of `width` pixels:
    /// 2*width+2 16-bit units.
    pub fn worst_case_line_capacity(width: u32) -> usize {
        (2 * width as usize + 2) * 2
    }

    /// Packet with `lines` owned, growable scanline buffers of `capacity`
    /// bytes each.
    pub fn new(lines: usize, capacity: usize, codec: RleCodec) -> Self {
        Self {
            scanlines: vec![
                RleScanline {
                    buf: vec![0; capacity],
                    used: 0,
                };
                lines
            ],
            owns_buffers: true,
            codec,
        }
    }

    /// Packet whose scanline buffers may not be reallocated.
    pub fn with_fixed_buffers(lines: usize, capacity: usize, codec: RleCodec) -> Self {
        Self {
            owns_buffers: false,
            ..Self::new(lines, capacity, codec)
        }
    }

    /// Single-scanline scratch packet sized for the worst case at `width`.
    pub fn single_line_worst_case(width: u32, codec: RleCodec) -> Self {
        Self::new(1, Self::worst_case_line_capacity(width), codec)
    }

    /// Identity-codec packet wrapping raw block bytes, one scanline per
    /// block row. The fallback constructor for paths that must degrade to
    /// uncompressed content.
    pub fn identity_over_raw(raw: &[u8], rows: usize, row_bytes: usize) -> Self {
        debug_assert!(raw.len() >= rows * row_bytes);
        let scanlines = (0..rows)
            .map(|r| RleScanline {
                buf: raw[r * row_bytes..(r + 1) * row_bytes].to_vec(),
                used: row_bytes,
            })
            .collect();
        Self {
            scanlines,
            owns_buffers: true,
            codec: RleCodec::Identity,
        }
    }

    pub fn lines(&self) -> usize {
        self.scanlines.len()
    }

    pub fn codec(&self) -> RleCodec {
        self.codec
    }

    pub fn set_codec(&mut self, codec: RleCodec) {
        self.codec = codec;
    }

    pub fn owns_buffers(&self) -> bool {
        self.owns_buffers
    }

    /// The used prefix of scanline `line`.
    pub fn scanline(&self, line: usize) -> &[u8] {
        let sl = &self.scanlines[line];
        &sl.buf[..sl.used]
    }

    pub fn scanline_capacity(&self, line: usize) -> usize {
        self.scanlines[line].buf.len()
    }

    /// Full-capacity mutable view of scanline `line`, for in-place decodes.
    /// Follow with [`set_scanline_len`](Self::set_scanline_len).
    pub fn scanline_mut(&mut self, line: usize) -> &mut [u8] {
        &mut self.scanlines[line].buf
    }

    /// Record how many bytes of scanline `line` are in use.
    pub fn set_scanline_len(&mut self, line: usize, used: usize) {
        debug_assert!(used <= self.scanlines[line].buf.len());
        self.scanlines[line].used = used;
    }

    /// Grow scanline `line` to at least `capacity` bytes.
    ///
    /// Growth is monotonic and requires buffer ownership; on a fixed-buffer
    /// packet this is a contract violation.
    pub fn ensure_scanline_capacity(
        &mut self,
        line: usize,
        capacity: usize,
    ) -> Result<(), BlockError> {
        if self.scanlines[line].buf.len() >= capacity {
            return Ok(());
        }
        debug_assert!(self.owns_buffers, "growing a fixed scanline buffer");
        if !self.owns_buffers {
            return Err(BlockError::Codec(format!(
                "scanline {} needs {} bytes but the packet does not own its buffers",
                line, capacity
            )));
        }
        self.scanlines[line].buf.resize(capacity, 0);
        Ok(())
    }

    /// Replace the contents of scanline `line`, growing it if the packet
    /// owns its buffers.
    pub fn set_scanline(&mut self, line: usize, data: &[u8]) -> Result<(), BlockError> {
        self.ensure_scanline_capacity(line, data.len())?;
        let sl = &mut self.scanlines[line];
        sl.buf[..data.len()].copy_from_slice(data);
        sl.used = data.len();
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

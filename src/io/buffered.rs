//! Buffered random-access stream.
//!
//! [`BufferedStream`] wraps any [`RandomAccessStream`] and keeps recently
//! loaded byte ranges in an MRU list of buffers:
//!
//! - Reads are served from overlapping buffers first; only the residual is
//!   loaded from the underlying stream, in a single call sized
//!   opportunistically to benefit sequential access.
//! - Writes purge every buffer overlapping the written range before going
//!   through, so a read never observes pre-write bytes.
//! - Advisory range locks are forwarded to the underlying stream and
//!   tracked; unlocking a range on a writable stream purges overlapping
//!   buffers, and an exclusive lock covering a read constrains the load to
//!   the exact residual.
//!
//! The stream guards its buffer and lock lists with its own private mutex,
//! independent of any file-level monitor, so cooperating editors can share
//! one instance behind an `Arc`.

use std::collections::VecDeque;
use std::sync::Mutex;

use tracing::trace;

use crate::config::StreamConfig;
use crate::error::StreamError;
use crate::io::RandomAccessStream;

// =============================================================================
// Bookkeeping entries
// =============================================================================

/// One cached byte range. Buffers live in an MRU list: front = most
/// recently used, eviction candidates come from the back.
#[derive(Debug)]
struct BufferInfo {
    start: u64,
    data: Vec<u8>,
}

impl BufferInfo {
    fn end(&self) -> u64 {
        self.start + self.data.len() as u64
    }

    fn contains(&self, pos: u64) -> bool {
        pos >= self.start && pos < self.end()
    }

    fn overlaps(&self, start: u64, end: u64) -> bool {
        self.start < end && start < self.end()
    }
}

/// An outstanding caller-held byte-range lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LockInfo {
    start: u64,
    len: u64,
    exclusive: bool,
}

impl LockInfo {
    fn covers(&self, start: u64, end: u64) -> bool {
        self.start <= start && end <= self.start + self.len
    }
}

#[derive(Debug)]
struct StreamState<S> {
    inner: S,
    pos: u64,
    buffers: VecDeque<BufferInfo>,
    locks: Vec<LockInfo>,
    /// Total bytes held across all buffers.
    buffered: usize,
}

impl<S> StreamState<S> {
    fn purge_overlapping(&mut self, start: u64, end: u64) {
        let mut i = 0;
        while i < self.buffers.len() {
            if self.buffers[i].overlaps(start, end) {
                let freed = self.buffers.remove(i).expect("index in bounds");
                self.buffered -= freed.data.len();
            } else {
                i += 1;
            }
        }
    }
}

// =============================================================================
// Buffered Stream
// =============================================================================

/// MRU-buffered wrapper over a random-access stream.
pub struct BufferedStream<S: RandomAccessStream> {
    state: Mutex<StreamState<S>>,
    config: StreamConfig,
    writable: bool,
    url: String,
}

impl<S: RandomAccessStream> BufferedStream<S> {
    /// Wrap `inner` with the default configuration.
    pub fn new(inner: S, writable: bool) -> Self {
        Self::with_config(inner, writable, StreamConfig::default())
    }

    /// Wrap `inner` with an explicit configuration. The configuration is
    /// expected to be validated by the caller.
    pub fn with_config(inner: S, writable: bool, config: StreamConfig) -> Self {
        debug_assert!(config.validate().is_ok());
        let url = inner.url().to_string();
        Self {
            state: Mutex::new(StreamState {
                inner,
                pos: 0,
                buffers: VecDeque::new(),
                locks: Vec::new(),
                buffered: 0,
            }),
            config,
            writable,
            url,
        }
    }

    /// Read up to `buf.len()` bytes at the current position.
    ///
    /// Overlapping bytes are served from existing buffers first; buffers
    /// consumed through their final byte are freed, partially consumed ones
    /// are promoted to the MRU front. The residual is loaded from the
    /// underlying stream in one call and becomes a fresh MRU buffer.
    /// Returns the number of bytes read; short reads at end of stream are
    /// not errors.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize, StreamError> {
        if buf.is_empty() {
            return Ok(0);
        }
        let state = &mut *self.state.lock().unwrap();
        let start = state.pos;
        let mut copied = 0;

        // Serve the buffered prefix.
        while copied < buf.len() {
            let cur = start + copied as u64;
            let Some(idx) = state.buffers.iter().position(|b| b.contains(cur)) else {
                break;
            };
            let b = &state.buffers[idx];
            let off = (cur - b.start) as usize;
            let n = (b.data.len() - off).min(buf.len() - copied);
            buf[copied..copied + n].copy_from_slice(&b.data[off..off + n]);
            copied += n;

            if off + n == b.data.len() {
                // Consumed through the buffer's final byte: free it.
                let freed = state.buffers.remove(idx).expect("index in bounds");
                state.buffered -= freed.data.len();
            } else if idx != 0 {
                let b = state.buffers.remove(idx).expect("index in bounds");
                state.buffers.push_front(b);
            }
        }

        // Load the residual from the underlying stream.
        if copied < buf.len() {
            let cur = start + copied as u64;
            let residual = buf.len() - copied;

            let threshold = self.config.buffer_limit * self.config.ratio_delete as usize / 100;
            if self.config.buffer_limit.saturating_sub(state.buffered) < threshold {
                if let Some(victim) = state.buffers.pop_back() {
                    state.buffered -= victim.data.len();
                    trace!(
                        start = victim.start,
                        len = victim.data.len(),
                        "evicted least-recently-used buffer"
                    );
                }
            }

            let free = self.config.buffer_limit.saturating_sub(state.buffered);
            let end = cur + residual as u64;
            let constrained = state
                .locks
                .iter()
                .any(|l| l.exclusive && l.covers(cur, end));
            let load = if constrained {
                residual
            } else {
                residual.max(free * self.config.ratio_alloc as usize / 100)
            };

            state.inner.seek_to(cur)?;
            let mut data = vec![0u8; load];
            let got = state.inner.read(&mut data)?;
            data.truncate(got);

            let n = got.min(residual);
            buf[copied..copied + n].copy_from_slice(&data[..n]);
            copied += n;

            if !data.is_empty() {
                trace!(start = cur, len = data.len(), "loaded buffer");
                state.buffered += data.len();
                state.buffers.push_front(BufferInfo { start: cur, data });
            }
        }

        state.pos = start + copied as u64;
        Ok(copied)
    }

    /// Write `buf` at the current position.
    ///
    /// Every buffer overlapping the written range is purged first, so no
    /// subsequent read can observe pre-write bytes.
    pub fn write(&self, buf: &[u8]) -> Result<(), StreamError> {
        if buf.is_empty() {
            return Ok(());
        }
        let state = &mut *self.state.lock().unwrap();
        let pos = state.pos;
        state.purge_overlapping(pos, pos + buf.len() as u64);
        state.inner.seek_to(pos)?;
        state.inner.write(buf)?;
        state.pos = pos + buf.len() as u64;
        Ok(())
    }

    /// Move the current position. The underlying seek is deferred to the
    /// next read or write.
    pub fn seek_to(&self, pos: u64) -> Result<(), StreamError> {
        self.state.lock().unwrap().pos = pos;
        Ok(())
    }

    /// Lock `[start, start + len)` on the underlying stream and record it.
    pub fn lock(&self, start: u64, len: u64, shared: bool) -> Result<(), StreamError> {
        let state = &mut *self.state.lock().unwrap();
        state.inner.lock(start, len, shared)?;
        state.locks.push(LockInfo {
            start,
            len,
            exclusive: !shared,
        });
        Ok(())
    }

    /// Unlock `[start, start + len)` on the underlying stream.
    ///
    /// On a writable stream, buffered bytes overlapping the unlocked range
    /// are purged: another writer may change them once the lock is gone.
    pub fn unlock(&self, start: u64, len: u64) -> Result<(), StreamError> {
        let state = &mut *self.state.lock().unwrap();
        state.inner.unlock(start, len)?;
        if self.writable {
            state.purge_overlapping(start, start + len);
        }
        if let Some(idx) = state
            .locks
            .iter()
            .position(|l| l.start == start && l.len == len)
        {
            state.locks.swap_remove(idx);
        }
        Ok(())
    }

    /// Drop all buffers unconditionally.
    pub fn clean_buffers(&self) {
        let state = &mut *self.state.lock().unwrap();
        state.buffers.clear();
        state.buffered = 0;
    }

    /// Total bytes currently buffered.
    pub fn buffered_bytes(&self) -> usize {
        self.state.lock().unwrap().buffered
    }

    /// Number of buffers in the MRU list.
    pub fn buffer_count(&self) -> usize {
        self.state.lock().unwrap().buffers.len()
    }

    /// Current stream position.
    pub fn position(&self) -> u64 {
        self.state.lock().unwrap().pos
    }

    pub fn size(&self) -> u64 {
        self.state.lock().unwrap().inner.size()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Unwrap the underlying stream, discarding all buffers.
    pub fn into_inner(self) -> S {
        self.state.into_inner().unwrap().inner
    }
}

impl<S: RandomAccessStream> RandomAccessStream for BufferedStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
        BufferedStream::read(self, buf)
    }

    fn write(&mut self, buf: &[u8]) -> Result<(), StreamError> {
        BufferedStream::write(self, buf)
    }

    fn seek_to(&mut self, pos: u64) -> Result<(), StreamError> {
        BufferedStream::seek_to(self, pos)
    }

    fn lock(&mut self, start: u64, len: u64, shared: bool) -> Result<(), StreamError> {
        BufferedStream::lock(self, start, len, shared)
    }

    fn unlock(&mut self, start: u64, len: u64) -> Result<(), StreamError> {
        BufferedStream::unlock(self, start, len)
    }

    fn size(&self) -> u64 {
        BufferedStream::size(self)
    }

    fn url(&self) -> &str {
        BufferedStream::url(self)
    }
}

/// Cooperating editors share one buffered stream behind an `Arc`; the
/// stream's private mutex makes the shared handle a stream in its own
/// right.
impl<S: RandomAccessStream> RandomAccessStream for std::sync::Arc<BufferedStream<S>> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
        (**self).read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> Result<(), StreamError> {
        (**self).write(buf)
    }

    fn seek_to(&mut self, pos: u64) -> Result<(), StreamError> {
        (**self).seek_to(pos)
    }

    fn lock(&mut self, start: u64, len: u64, shared: bool) -> Result<(), StreamError> {
        (**self).lock(start, len, shared)
    }

    fn unlock(&mut self, start: u64, len: u64) -> Result<(), StreamError> {
        (**self).unlock(start, len)
    }

    fn size(&self) -> u64 {
        (**self).size()
    }

    fn url(&self) -> &str {
        (**self).url()
    }
}

// =============================================================================
// Tests
// =============================================================================

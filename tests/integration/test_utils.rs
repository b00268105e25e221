//! Test utilities for integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use raster_blocks::{MemoryStream, RandomAccessStream, StreamError};

/// Initialize tracing for tests honoring `RUST_LOG`. Safe to call from
/// every test; only the first call installs the subscriber.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// Deterministic byte pattern for content comparisons.
pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| seed.wrapping_add((i % 239) as u8))
        .collect()
}

// =============================================================================
// Tracking Stream
// =============================================================================

/// A memory stream that tracks all underlying read requests.
///
/// Useful for verifying buffering behavior and request patterns.
pub struct TrackingStream {
    inner: MemoryStream,
    read_count: Arc<AtomicUsize>,
    write_count: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<usize>>>,
}

impl TrackingStream {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            inner: MemoryStream::with_data("mem://tracking", data),
            read_count: Arc::new(AtomicUsize::new(0)),
            write_count: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn read_counter(&self) -> Arc<AtomicUsize> {
        self.read_count.clone()
    }

    pub fn write_counter(&self) -> Arc<AtomicUsize> {
        self.write_count.clone()
    }

    /// Sizes of all underlying read requests, in order.
    pub fn request_sizes(&self) -> Arc<Mutex<Vec<usize>>> {
        self.requests.clone()
    }
}

impl RandomAccessStream for TrackingStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
        self.read_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(buf.len());
        self.inner.read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> Result<(), StreamError> {
        self.write_count.fetch_add(1, Ordering::SeqCst);
        self.inner.write(buf)
    }

    fn seek_to(&mut self, pos: u64) -> Result<(), StreamError> {
        self.inner.seek_to(pos)
    }

    fn lock(&mut self, start: u64, len: u64, shared: bool) -> Result<(), StreamError> {
        self.inner.lock(start, len, shared)
    }

    fn unlock(&mut self, start: u64, len: u64) -> Result<(), StreamError> {
        self.inner.unlock(start, len)
    }

    fn size(&self) -> u64 {
        self.inner.size()
    }

    fn url(&self) -> &str {
        self.inner.url()
    }
}

//! Raster file handles, file-keyed monitors, and region locks.
//!
//! A [`RasterFile`] stands in for one logical raster container: it carries
//! the identity key cooperating editors synchronize on, the access mode the
//! cached editor consults, and the sharing-control counter adapters bump to
//! signal edits to other observers.
//!
//! Monitors are process-wide and keyed by file URL, so two editors opened
//! over the same logical file serialize their flag-array transitions even
//! when they hold distinct `RasterFile` handles.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use dashmap::DashMap;

// =============================================================================
// Access Mode
// =============================================================================

/// How a raster file was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Existing file, read-only
    Read,
    /// Existing file, read-write
    ReadWrite,
    /// New file being created
    Create,
    /// Existing file being exported into a new container
    Export,
}

impl AccessMode {
    /// Whether the file is being authored (created or exported). A cached
    /// editor never populates from an authoring source: there is nothing
    /// behind it to read yet.
    pub fn is_authoring(self) -> bool {
        matches!(self, AccessMode::Create | AccessMode::Export)
    }

    pub fn is_writable(self) -> bool {
        !matches!(self, AccessMode::Read)
    }
}

// =============================================================================
// Monitor registry
// =============================================================================

static MONITORS: OnceLock<DashMap<String, Arc<Mutex<()>>>> = OnceLock::new();

/// The monitor guarding all editors of the logical file identified by `key`.
///
/// Returns the same `Arc` for the same key for the lifetime of the process.
pub fn monitor_for(key: &str) -> Arc<Mutex<()>> {
    MONITORS
        .get_or_init(DashMap::new)
        .entry(key.to_string())
        .or_insert_with(|| Arc::new(Mutex::new(())))
        .clone()
}

// =============================================================================
// Raster File
// =============================================================================

/// Handle to one logical raster container.
#[derive(Debug)]
pub struct RasterFile {
    url: String,
    access: AccessMode,
    sharing_count: AtomicU64,
    active_locks: AtomicU64,
}

impl RasterFile {
    pub fn new(url: impl Into<String>, access: AccessMode) -> Arc<Self> {
        Arc::new(Self {
            url: url.into(),
            access,
            sharing_count: AtomicU64::new(0),
            active_locks: AtomicU64::new(0),
        })
    }

    /// The monitor key: logical file identity.
    pub fn key(&self) -> &str {
        &self.url
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn access_mode(&self) -> AccessMode {
        self.access
    }

    /// The monitor shared by every editor opened over this logical file.
    pub fn monitor(&self) -> Arc<Mutex<()>> {
        monitor_for(self.key())
    }

    /// Bump the sharing-control counter, signalling an edit to cooperating
    /// observers of this file. Returns the new count.
    pub fn sharing_control_increment(&self) -> u64 {
        self.sharing_count.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn sharing_control_count(&self) -> u64 {
        self.sharing_count.load(Ordering::SeqCst)
    }

    /// Acquire a region lock over `[start, start + len)` of the file.
    ///
    /// The token is released when dropped. Composite operations (multi-tile
    /// strip reads/writes) hold one token across all their inner calls so
    /// cooperating readers observe them atomically.
    pub fn lock_region(self: &Arc<Self>, start: u64, len: u64, shared: bool) -> RegionLock {
        self.active_locks.fetch_add(1, Ordering::SeqCst);
        RegionLock {
            file: Arc::clone(self),
            start,
            len,
            shared,
        }
    }

    /// Number of currently outstanding region locks.
    pub fn active_region_locks(&self) -> u64 {
        self.active_locks.load(Ordering::SeqCst)
    }
}

// =============================================================================
// Region Lock
// =============================================================================

/// A caller-held byte-range lock on a raster file, released on drop.
#[derive(Debug)]
pub struct RegionLock {
    file: Arc<RasterFile>,
    start: u64,
    len: u64,
    shared: bool,
}

impl RegionLock {
    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_shared(&self) -> bool {
        self.shared
    }
}

impl Drop for RegionLock {
    fn drop(&mut self) {
        self.file.active_locks.fetch_sub(1, Ordering::SeqCst);
    }
}

// =============================================================================
// Tests
// =============================================================================

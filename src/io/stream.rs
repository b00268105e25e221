//! Random-access byte streams.
//!
//! [`RandomAccessStream`] is the seam between block editors and storage:
//! a positioned, blocking byte stream with advisory range locking. Two
//! implementations ship with the crate: [`MemoryStream`] for in-memory
//! stores and tests, and [`FileStream`] over `std::fs::File`.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use bytes::BytesMut;

use crate::error::StreamError;

// =============================================================================
// Stream Trait
// =============================================================================

/// A blocking random-access byte stream.
///
/// Reads return the number of bytes actually read; a short read at end of
/// stream is not an error. Implementations must make progress on every
/// `read` call unless the position is at or past the end.
pub trait RandomAccessStream: Send {
    /// Read up to `buf.len()` bytes at the current position, advancing it.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StreamError>;

    /// Write all of `buf` at the current position, advancing it.
    fn write(&mut self, buf: &[u8]) -> Result<(), StreamError>;

    /// Move the current position.
    fn seek_to(&mut self, pos: u64) -> Result<(), StreamError>;

    /// Acquire an advisory lock over `[start, start + len)`.
    fn lock(&mut self, start: u64, len: u64, shared: bool) -> Result<(), StreamError>;

    /// Release an advisory lock over `[start, start + len)`.
    fn unlock(&mut self, start: u64, len: u64) -> Result<(), StreamError>;

    /// Total size of the stream in bytes.
    fn size(&self) -> u64;

    /// Identifier for this stream (for logging and monitor keys).
    fn url(&self) -> &str;
}

// =============================================================================
// Memory Stream
// =============================================================================

/// Growable in-memory stream.
///
/// Writes past the current end extend the store, zero-filling any gap.
/// Lock and unlock are accepted and ignored: a private memory store has no
/// other observers.
#[derive(Debug)]
pub struct MemoryStream {
    data: BytesMut,
    pos: u64,
    url: String,
}

impl MemoryStream {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            data: BytesMut::new(),
            pos: 0,
            url: url.into(),
        }
    }

    /// Stream pre-populated with `data`.
    pub fn with_data(url: impl Into<String>, data: impl AsRef<[u8]>) -> Self {
        Self {
            data: BytesMut::from(data.as_ref()),
            pos: 0,
            url: url.into(),
        }
    }

    /// The full current contents.
    pub fn contents(&self) -> &[u8] {
        &self.data
    }
}

impl RandomAccessStream for MemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
        if buf.is_empty() {
            return Ok(0);
        }
        let len = self.data.len() as u64;
        if self.pos >= len {
            return Ok(0);
        }
        let start = self.pos as usize;
        let n = buf.len().min((len - self.pos) as usize);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        self.pos += n as u64;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<(), StreamError> {
        if buf.is_empty() {
            return Ok(());
        }
        let end = self.pos as usize + buf.len();
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        let start = self.pos as usize;
        self.data[start..end].copy_from_slice(buf);
        self.pos = end as u64;
        Ok(())
    }

    fn seek_to(&mut self, pos: u64) -> Result<(), StreamError> {
        self.pos = pos;
        Ok(())
    }

    fn lock(&mut self, _start: u64, _len: u64, _shared: bool) -> Result<(), StreamError> {
        Ok(())
    }

    fn unlock(&mut self, _start: u64, _len: u64) -> Result<(), StreamError> {
        Ok(())
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn url(&self) -> &str {
        &self.url
    }
}

// =============================================================================
// File Stream
// =============================================================================

/// Stream over a local file.
///
/// Range locks are advisory bookkeeping at this layer; cross-process file
/// locking belongs to the container plugin that owns the file handle.
#[derive(Debug)]
pub struct FileStream {
    file: File,
    pos: u64,
    size: u64,
    url: String,
}

impl FileStream {
    /// Open an existing file, optionally writable.
    pub fn open(path: impl AsRef<Path>, writable: bool) -> Result<Self, StreamError> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(writable)
            .open(path)
            .map_err(|e| StreamError::Io(e.to_string()))?;
        let size = file
            .metadata()
            .map_err(|e| StreamError::Io(e.to_string()))?
            .len();
        Ok(Self {
            file,
            pos: 0,
            size,
            url: format!("file://{}", path.display()),
        })
    }

    /// Create (or truncate) a writable file.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, StreamError> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| StreamError::Io(e.to_string()))?;
        Ok(Self {
            file,
            pos: 0,
            size: 0,
            url: format!("file://{}", path.display()),
        })
    }
}

impl RandomAccessStream for FileStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.file
            .seek(SeekFrom::Start(self.pos))
            .map_err(|e| StreamError::Io(e.to_string()))?;
        let mut total = 0;
        while total < buf.len() {
            match self.file.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(StreamError::Io(e.to_string())),
            }
        }
        self.pos += total as u64;
        Ok(total)
    }

    fn write(&mut self, buf: &[u8]) -> Result<(), StreamError> {
        if buf.is_empty() {
            return Ok(());
        }
        self.file
            .seek(SeekFrom::Start(self.pos))
            .map_err(|e| StreamError::Io(e.to_string()))?;
        self.file
            .write_all(buf)
            .map_err(|e| StreamError::Io(e.to_string()))?;
        self.pos += buf.len() as u64;
        self.size = self.size.max(self.pos);
        Ok(())
    }

    fn seek_to(&mut self, pos: u64) -> Result<(), StreamError> {
        self.pos = pos;
        Ok(())
    }

    fn lock(&mut self, _start: u64, _len: u64, _shared: bool) -> Result<(), StreamError> {
        Ok(())
    }

    fn unlock(&mut self, _start: u64, _len: u64) -> Result<(), StreamError> {
        Ok(())
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn url(&self) -> &str {
        &self.url
    }
}

// =============================================================================
// Tests
// =============================================================================

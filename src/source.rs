//! Random-access source abstraction (§9).
//!
//! Prefers a `read_at(offset, len, buf)` contract over seek+read to avoid
//! shared-cursor locking across concurrent workers (§5: "the compressed
//! source is accessed concurrently via random-access reads... each worker
//! issues independent `readAt` calls"). Callers who only offer a seeking
//! reader are adapted internally with a mutex-guarded wrapper, exactly as
//! called out in §9.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::sync::Mutex;

use crate::error::{RacError, RacResult};

/// A compressed-byte source that supports concurrent random-access reads.
/// Implementors must be safe to call from multiple worker threads at once;
/// `SeekReadSource` below is the fallback for sources that are not.
pub trait RandomAccessSource: Send + Sync {
    /// Fill `buf` with bytes starting at `offset`. Returns the number of
    /// bytes actually read, which is `min(buf.len(), size - offset)` —
    /// never an error purely for running off the end (§4.7's `readAt`
    /// contract, reused here for the compressed source).
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> RacResult<usize>;

    /// Total size of the source in bytes.
    fn len(&self) -> u64;

    /// Read exactly `buf.len()` bytes at `offset`, failing if the source
    /// runs out first (used by callers that require a whole chunk).
    fn read_at_exact(&self, offset: u64, buf: &mut [u8]) -> RacResult<()> {
        let n = self.read_at(offset, buf)?;
        if n != buf.len() {
            return Err(RacError::ShortRead);
        }
        Ok(())
    }
}

/// An in-memory compressed source. Reads never block and never fail short
/// of a true out-of-bounds request (which this contract defines as `Ok(0)`
/// past the end, per `RandomAccessSource::read_at`).
pub struct MemorySource {
    bytes: Vec<u8>,
}

impl MemorySource {
    pub fn new(bytes: Vec<u8>) -> Self {
        MemorySource { bytes }
    }
}

impl RandomAccessSource for MemorySource {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> RacResult<usize> {
        let offset = offset as usize;
        if offset >= self.bytes.len() {
            return Ok(0);
        }
        let avail = &self.bytes[offset..];
        let n = avail.len().min(buf.len());
        buf[..n].copy_from_slice(&avail[..n]);
        Ok(n)
    }

    fn len(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Adapts any `Read + Seek` source (e.g. a single `std::fs::File` handle
/// shared across workers) into a `RandomAccessSource` by serializing all
/// access behind a mutex, per §9's "adapt internally with a mutex-guarded
/// wrapper" and §5's fallback policy for sources that are not natively
/// concurrent-read-safe.
pub struct SeekReadSource<R> {
    inner: Mutex<R>,
    size: u64,
}

impl<R: Read + Seek> SeekReadSource<R> {
    pub fn new(mut inner: R) -> RacResult<Self> {
        let size = inner.seek(SeekFrom::End(0))?;
        Ok(SeekReadSource {
            inner: Mutex::new(inner),
            size,
        })
    }
}

impl<R: Read + Seek + Send> RandomAccessSource for SeekReadSource<R> {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> RacResult<usize> {
        if offset >= self.size {
            return Ok(0);
        }
        let mut guard = self.inner.lock().expect("source mutex poisoned");
        guard.seek(SeekFrom::Start(offset))?;
        let want = buf.len().min((self.size - offset) as usize);
        let mut total = 0;
        while total < want {
            match guard.read(&mut buf[total..want]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(total)
    }

    fn len(&self) -> u64 {
        self.size
    }
}

/// Convenience: open a plain file path as a random-access source.
pub fn open_file_source(path: &std::path::Path) -> RacResult<SeekReadSource<File>> {
    let file = File::open(path)?;
    SeekReadSource::new(file)
}

//! TempStorage (§4.6, §7): the encoder driver's scratch space for bytes it
//! has compressed but not yet committed to the final output — needed
//! because `CChunkSize` bisection can require re-emitting a chunk's header
//! only after later chunks reveal its final size, and because `IndexLocation::End`
//! needs the whole index buffered until the data stream is fully written.

use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::Mutex;

use crate::error::RacResult;

/// Append-only scratch storage with random-access readback, backed either
/// by memory or by an anonymous on-disk file (§7's "temp storage backing").
pub trait TempStorage: Send + Sync {
    /// Append `bytes` to the end of storage, returning the offset it was
    /// written at.
    fn append(&self, bytes: &[u8]) -> RacResult<u64>;

    /// Current total length of the storage.
    fn len(&self) -> RacResult<u64>;

    /// Read back `len` bytes starting at `offset`.
    fn read_at(&self, offset: u64, len: usize) -> RacResult<Vec<u8>>;

    fn is_empty(&self) -> RacResult<bool> {
        Ok(self.len()? == 0)
    }
}

/// In-memory backing: a single growable buffer guarded by a mutex, since
/// the encoder driver may append from a worker thread while the writer
/// reads previously committed bytes back for a retry (§4.6 bisection).
#[derive(Default)]
pub struct InMemoryTempStorage {
    buf: Mutex<Vec<u8>>,
}

impl InMemoryTempStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TempStorage for InMemoryTempStorage {
    fn append(&self, bytes: &[u8]) -> RacResult<u64> {
        let mut buf = self.buf.lock().expect("temp storage mutex poisoned");
        let offset = buf.len() as u64;
        buf.extend_from_slice(bytes);
        Ok(offset)
    }

    fn len(&self) -> RacResult<u64> {
        Ok(self.buf.lock().expect("temp storage mutex poisoned").len() as u64)
    }

    fn read_at(&self, offset: u64, len: usize) -> RacResult<Vec<u8>> {
        let buf = self.buf.lock().expect("temp storage mutex poisoned");
        let start = offset as usize;
        let end = start + len;
        Ok(buf.get(start..end).unwrap_or(&[]).to_vec())
    }
}

/// On-disk backing: an anonymous, unlinked temp file (§7). Used when the
/// caller expects `DFileSize` large enough that buffering the whole index
/// or retry window in memory would be wasteful.
pub struct OnDiskTempStorage {
    file: Mutex<std::fs::File>,
}

impl OnDiskTempStorage {
    pub fn new() -> RacResult<Self> {
        Ok(OnDiskTempStorage {
            file: Mutex::new(tempfile::tempfile()?),
        })
    }
}

impl TempStorage for OnDiskTempStorage {
    fn append(&self, bytes: &[u8]) -> RacResult<u64> {
        let mut file = self.file.lock().expect("temp storage mutex poisoned");
        let offset = file.seek(SeekFrom::End(0))?;
        file.write_all(bytes)?;
        Ok(offset)
    }

    fn len(&self) -> RacResult<u64> {
        let mut file = self.file.lock().expect("temp storage mutex poisoned");
        Ok(file.seek(SeekFrom::End(0))?)
    }

    fn read_at(&self, offset: u64, len: usize) -> RacResult<Vec<u8>> {
        let mut file = self.file.lock().expect("temp storage mutex poisoned");
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; len];
        let mut total = 0;
        while total < len {
            match file.read(&mut buf[total..])? {
                0 => break,
                n => total += n,
            }
        }
        buf.truncate(total);
        Ok(buf)
    }
}

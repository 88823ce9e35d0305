//! Random-access byte sources backing an open map file
//!
//! The decoder never streams a map file. It reads the header once and
//! then fetches index blocks and data blocks at absolute offsets. A
//! [`MapSource`] provides exactly that: a total length and a positional
//! read. Three sources ship with the crate:
//!
//! - [`FileSource`]: one file handle, seek and read serialized by a mutex
//! - [`MmapSource`]: a read-only memory map
//! - [`MemorySource`]: an owned byte vector, handy for tests and fuzzing
//!
//! # Example
//!
//! ```rust
//! use mapsforge_reader::source::{MapSource, MemorySource};
//!
//! let source = MemorySource::new(vec![1, 2, 3, 4]);
//! let mut buf = [0u8; 2];
//! assert_eq!(source.read_at(2, &mut buf).unwrap(), 2);
//! assert_eq!(buf, [3, 4]);
//! ```

use memmap2::Mmap;
use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Mutex;

/// Positional read access to the bytes of a map file.
pub trait MapSource: Send + Sync {
    /// Total length of the source in bytes.
    fn len(&self) -> u64;

    /// Whether the source holds no bytes.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fill as much of `buf` as possible starting at `offset`.
    ///
    /// Returns the number of bytes copied. A count smaller than `buf.len()`
    /// means the source ended first.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;
}

/// Check that `path` names an existing, readable, regular file.
pub fn check_file(path: &Path) -> io::Result<fs::Metadata> {
    let meta = fs::metadata(path).map_err(|e| {
        io::Error::new(
            e.kind(),
            format!("cannot access map file {}: {}", path.display(), e),
        )
    })?;
    if !meta.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("map file {} is not a regular file", path.display()),
        ));
    }
    Ok(meta)
}

/// A map file read through a single shared file handle.
pub struct FileSource {
    file: Mutex<File>,
    len: u64,
}

impl FileSource {
    /// Open `path` after checking that it is a readable regular file.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref();
        let meta = check_file(path)?;
        let file = File::open(path)?;
        Ok(Self {
            file: Mutex::new(file),
            len: meta.len(),
        })
    }
}

impl MapSource for FileSource {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::other("map file handle lock poisoned"))?;
        file.seek(SeekFrom::Start(offset))?;
        let mut filled = 0;
        while filled < buf.len() {
            match file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

fn copy_from(bytes: &[u8], offset: u64, buf: &mut [u8]) -> usize {
    let Ok(start) = usize::try_from(offset) else {
        return 0;
    };
    if start >= bytes.len() {
        return 0;
    }
    let n = buf.len().min(bytes.len() - start);
    buf[..n].copy_from_slice(&bytes[start..start + n]);
    n
}

/// A map file accessed through a read-only memory map.
pub struct MmapSource {
    mmap: Mmap,
}

impl MmapSource {
    /// Map `path` into memory after the same checks as [`FileSource::open`].
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref();
        check_file(path)?;
        let file = File::open(path)?;
        // SAFETY: the map is read-only; a concurrent writer truncating the
        // file is outside what this reader supports.
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self { mmap })
    }
}

impl MapSource for MmapSource {
    fn len(&self) -> u64 {
        self.mmap.len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        Ok(copy_from(&self.mmap, offset, buf))
    }
}

/// A map file held entirely in memory.
pub struct MemorySource {
    bytes: Vec<u8>,
}

impl MemorySource {
    /// Wrap owned bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

impl MapSource for MemorySource {
    fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        Ok(copy_from(&self.bytes, offset, buf))
    }
}

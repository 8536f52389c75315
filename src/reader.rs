//! Positional byte sources.
//!
//! The object layer needs random access: xref offsets point anywhere in the
//! file and objects are materialised on demand. [`ReadAt`] is the minimal
//! contract (positional reads over a known length); the whole-buffer
//! [`SliceSource`] is what the document layer uses in practice, since
//! ingestion pipelines hand us bytes or memory-mapped regions.

use crate::error::{Error, Result};
use bytes::Bytes;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Positional byte source of known length.
///
/// Implementations must tolerate arbitrary offsets; reads past the end
/// return fewer bytes (possibly zero), never an error.
pub trait ReadAt: Send + Sync {
    /// Read up to `buf.len()` bytes starting at `offset`.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> usize;

    /// Total length of the source in bytes.
    fn len(&self) -> u64;

    /// True when the source is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory byte source backed by [`Bytes`].
///
/// Cloning shares the underlying buffer.
#[derive(Debug, Clone)]
pub struct SliceSource {
    data: Bytes,
}

impl SliceSource {
    /// Wrap an owned buffer.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// Load a file fully into memory.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        Ok(Self::new(data))
    }

    /// The whole buffer.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Slice `[offset, offset+len)`, clamped to the buffer end.
    ///
    /// Out-of-range offsets yield an empty slice rather than a panic, so a
    /// corrupt xref offset degrades to "object not found" upstream.
    pub fn window(&self, offset: u64, len: usize) -> &[u8] {
        let start = (offset as usize).min(self.data.len());
        let end = start.saturating_add(len).min(self.data.len());
        &self.data[start..end]
    }

    /// Everything from `offset` to the end of the buffer.
    pub fn from_offset(&self, offset: u64) -> &[u8] {
        let start = (offset as usize).min(self.data.len());
        &self.data[start..]
    }

    /// The final `n` bytes (fewer if the buffer is shorter).
    pub fn tail(&self, n: usize) -> &[u8] {
        let start = self.data.len().saturating_sub(n);
        &self.data[start..]
    }

    /// Byte offset where [`SliceSource::tail`] starts.
    pub fn tail_offset(&self, n: usize) -> u64 {
        self.data.len().saturating_sub(n) as u64
    }
}

impl ReadAt for SliceSource {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> usize {
        let window = self.window(offset, buf.len());
        buf[..window.len()].copy_from_slice(window);
        window.len()
    }

    fn len(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Copy an arbitrary [`ReadAt`] fully into a [`SliceSource`].
///
/// The object layer parses out of a contiguous buffer; callers with mmap or
/// `pread`-style sources funnel through here once at open time.
pub fn collect_source<S: ReadAt + ?Sized>(source: &S) -> Result<SliceSource> {
    let len = source.len();
    if len > usize::MAX as u64 {
        return Err(Error::InvalidPdf("source larger than address space".to_string()));
    }
    let mut data = vec![0u8; len as usize];
    let mut read = 0usize;
    while read < data.len() {
        let n = source.read_at(&mut data[read..], read as u64);
        if n == 0 {
            return Err(Error::UnexpectedEof);
        }
        read += n;
    }
    Ok(SliceSource::new(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_at_basic() {
        let src = SliceSource::new(b"hello world".to_vec());
        let mut buf = [0u8; 5];
        assert_eq!(src.read_at(&mut buf, 6), 5);
        assert_eq!(&buf, b"world");
    }

    #[test]
    fn test_read_past_end() {
        let src = SliceSource::new(b"abc".to_vec());
        let mut buf = [0u8; 8];
        assert_eq!(src.read_at(&mut buf, 1), 2);
        assert_eq!(&buf[..2], b"bc");
        assert_eq!(src.read_at(&mut buf, 100), 0);
    }

    #[test]
    fn test_window_clamps() {
        let src = SliceSource::new(b"0123456789".to_vec());
        assert_eq!(src.window(8, 10), b"89");
        assert_eq!(src.window(100, 10), b"");
    }

    #[test]
    fn test_tail() {
        let src = SliceSource::new(b"0123456789".to_vec());
        assert_eq!(src.tail(4), b"6789");
        assert_eq!(src.tail(100), b"0123456789");
        assert_eq!(src.tail_offset(4), 6);
    }

    #[test]
    fn test_collect_source_round_trip() {
        let src = SliceSource::new(b"round trip".to_vec());
        let copied = collect_source(&src).unwrap();
        assert_eq!(copied.as_slice(), b"round trip");
    }
}

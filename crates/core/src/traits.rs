//! Byte sink and byte source capabilities
//!
//! Writers only ever append, readers only ever read ranges. Both sides are
//! expressed as narrow traits so archives can live in files, in memory, or
//! behind any stream the caller adapts.

use parking_lot::Mutex;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

/// Sequential byte sink used by archive writers.
///
/// `append` returns the number of bytes accepted. Anything short of
/// `data.len()` is treated by the writer as a fatal write failure.
pub trait RecordSink {
    /// Append `data` at the current end of the sink.
    fn append(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Flush buffered bytes, if the sink buffers at all.
    fn flush_sink(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<W: Write + ?Sized> RecordSink for W {
    fn append(&mut self, data: &[u8]) -> io::Result<usize> {
        self.write_all(data)?;
        Ok(data.len())
    }

    fn flush_sink(&mut self) -> io::Result<()> {
        self.flush()
    }
}

/// Sink backed by an "append n bytes, return bytes accepted" callback.
///
/// ```ignore
/// let mut out = Vec::new();
/// let sink = FnSink::new(|b: &[u8]| { out.extend_from_slice(b); b.len() });
/// ```
pub struct FnSink<F> {
    append_fn: F,
}

impl<F> FnSink<F>
where
    F: FnMut(&[u8]) -> usize,
{
    /// Wrap an append callback
    pub fn new(append_fn: F) -> Self {
        FnSink { append_fn }
    }
}

impl<F> RecordSink for FnSink<F>
where
    F: FnMut(&[u8]) -> usize,
{
    fn append(&mut self, data: &[u8]) -> io::Result<usize> {
        Ok((self.append_fn)(data))
    }
}

/// Random-access byte source used by archive readers.
pub trait RecordSource {
    /// Total number of bytes available.
    fn size(&self) -> io::Result<u64>;

    /// Fill `buf` with the bytes starting at `offset`.
    ///
    /// Fails with `UnexpectedEof` if the range extends past the end.
    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()>;
}

fn out_of_range(offset: u64, len: usize, size: u64) -> io::Error {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!(
            "read of {} bytes at offset {} exceeds source size {}",
            len, offset, size
        ),
    )
}

impl RecordSource for [u8] {
    fn size(&self) -> io::Result<u64> {
        Ok(self.len() as u64)
    }

    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let size = self.len() as u64;
        let end = offset
            .checked_add(buf.len() as u64)
            .filter(|end| *end <= size)
            .ok_or_else(|| out_of_range(offset, buf.len(), size))?;
        buf.copy_from_slice(&self[offset as usize..end as usize]);
        Ok(())
    }
}

impl RecordSource for Vec<u8> {
    fn size(&self) -> io::Result<u64> {
        self.as_slice().size()
    }

    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        self.as_slice().read_exact_at(offset, buf)
    }
}

impl<T: RecordSource + ?Sized> RecordSource for &T {
    fn size(&self) -> io::Result<u64> {
        (**self).size()
    }

    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        (**self).read_exact_at(offset, buf)
    }
}

impl<T: RecordSource + ?Sized> RecordSource for Arc<T> {
    fn size(&self) -> io::Result<u64> {
        (**self).size()
    }

    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        (**self).read_exact_at(offset, buf)
    }
}

impl<T: RecordSource + ?Sized> RecordSource for Box<T> {
    fn size(&self) -> io::Result<u64> {
        (**self).size()
    }

    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        (**self).read_exact_at(offset, buf)
    }
}

/// Random-access source over any seekable stream.
///
/// Seek + read pairs are serialized through a mutex so the source can be
/// shared behind `&self`.
pub struct SeekSource<R> {
    inner: Mutex<R>,
    size: u64,
}

impl<R: Read + Seek> SeekSource<R> {
    /// Wrap a seekable stream, measuring its length once
    pub fn new(mut inner: R) -> io::Result<Self> {
        let size = inner.seek(SeekFrom::End(0))?;
        Ok(SeekSource {
            inner: Mutex::new(inner),
            size,
        })
    }

    /// Unwrap the underlying stream
    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }
}

impl<R: Read + Seek> RecordSource for SeekSource<R> {
    fn size(&self) -> io::Result<u64> {
        Ok(self.size)
    }

    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        if offset.saturating_add(buf.len() as u64) > self.size {
            return Err(out_of_range(offset, buf.len(), self.size));
        }
        let mut inner = self.inner.lock();
        inner.seek(SeekFrom::Start(offset))?;
        inner.read_exact(buf)
    }
}

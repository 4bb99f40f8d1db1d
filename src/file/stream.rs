use std::io::{ErrorKind, Read};

use crate::core::{Error, Result};
use crate::file::{Access, ByteFile, FileKind};

/// Serial-access source over any `std::io::Read`, such as a decompressor.
///
/// Reads must be contiguous: each one starts where the previous ended.
/// The stream has no size and refuses random access.
pub struct StreamFile<R> {
    inner: R,
    pos: u64,
}

impl<R: Read + Send> StreamFile<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, pos: 0 }
    }

    /// Offset of the next byte the stream will produce.
    pub fn position(&self) -> u64 {
        self.pos
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read + Send> ByteFile for StreamFile<R> {
    fn access(&self) -> Access {
        Access::READ_ONLY
    }

    fn kind(&self) -> FileKind {
        FileKind::Fifo
    }

    fn read_at(&mut self, pos: u64, buf: &mut [u8]) -> Result<usize> {
        if pos != self.pos {
            return Err(Error::Unsupported("non-sequential read of a stream"));
        }
        loop {
            match self.inner.read(buf) {
                Ok(n) => {
                    self.pos += n as u64;
                    return Ok(n);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn write_at(&mut self, _pos: u64, _buf: &[u8]) -> Result<usize> {
        Err(Error::ReadOnly)
    }

    fn size(&self) -> Result<u64> {
        Err(Error::Unsupported("size of a stream"))
    }

    fn set_size(&mut self, _size: u64) -> Result<()> {
        Err(Error::Unsupported("set_size of a stream"))
    }

    fn random_access(&self) -> Result<()> {
        Err(Error::Unsupported("random access to a stream"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn sequential_reads_advance() {
        let mut stream = StreamFile::new(Cursor::new(b"ACGTACGT".to_vec()));
        let mut buf = [0u8; 3];
        assert_eq!(stream.read_at(0, &mut buf).unwrap(), 3);
        assert_eq!(stream.read_at(3, &mut buf).unwrap(), 3);
        assert_eq!(stream.position(), 6);
        assert_eq!(stream.read_at(6, &mut buf).unwrap(), 2);
        assert_eq!(stream.read_at(8, &mut buf).unwrap(), 0);
    }

    #[test]
    fn out_of_order_reads_are_refused() {
        let mut stream = StreamFile::new(Cursor::new(b"ACGT".to_vec()));
        let mut buf = [0u8; 2];
        assert!(matches!(stream.read_at(2, &mut buf), Err(Error::Unsupported(_))));
        assert_eq!(stream.position(), 0);
    }

    #[test]
    fn streams_have_no_size_or_random_access() {
        let mut stream = StreamFile::new(Cursor::new(Vec::new()));
        assert!(matches!(stream.size(), Err(Error::Unsupported(_))));
        assert!(stream.random_access().is_err());
        assert!(matches!(stream.write_at(0, b"x"), Err(Error::ReadOnly)));
        assert_eq!(stream.kind(), FileKind::Fifo);
    }
}

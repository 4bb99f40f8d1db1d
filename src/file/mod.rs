//! The byte-file contract shared by queue files and the files they wrap.
//!
//! Every collaborator exposes positional reads and writes, a size, and a
//! random-access capability query. Queue files implement the same trait so
//! they can be stacked under anything that consumes a `ByteFile`.

use std::fs::File;

use crate::core::Result;

pub mod mem;
pub mod mmap;
pub mod std_file;
pub mod stream;

pub use mem::MemFile;
pub use mmap::MmapFile;
pub use std_file::StdFile;
pub use stream::StreamFile;

/// Directions a file was opened for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Access {
    pub read: bool,
    pub write: bool,
}

impl Access {
    pub const NONE: Access = Access { read: false, write: false };
    pub const READ_ONLY: Access = Access { read: true, write: false };
    pub const WRITE_ONLY: Access = Access { read: false, write: true };
    pub const READ_WRITE: Access = Access { read: true, write: true };
}

/// Implementation class of a file, not its content type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileKind {
    /// Ordinary file with random access.
    File,
    /// Serial access only: pipes, streams, queue files.
    Fifo,
    Memory,
    Mapped,
}

pub trait ByteFile: Send {
    fn access(&self) -> Access;

    fn kind(&self) -> FileKind {
        FileKind::File
    }

    /// Read up to `buf.len()` bytes at `pos`. `Ok(0)` means end of file.
    fn read_at(&mut self, pos: u64, buf: &mut [u8]) -> Result<usize>;

    /// Write up to `buf.len()` bytes at `pos`, returning the count accepted.
    fn write_at(&mut self, pos: u64, buf: &[u8]) -> Result<usize>;

    fn size(&self) -> Result<u64>;

    fn set_size(&mut self, size: u64) -> Result<()>;

    /// `Ok(())` if the file may be addressed at arbitrary positions.
    fn random_access(&self) -> Result<()> {
        Ok(())
    }

    /// Underlying OS file and the offset of its contiguous region, for
    /// memory mapping. `None` when no such file exists.
    fn sys_file(&self) -> Option<(&File, u64)> {
        None
    }

    /// Read until `buf` is full or the file ends.
    fn read_all_at(&mut self, mut pos: u64, buf: &mut [u8]) -> Result<usize> {
        let mut total = 0;
        while total < buf.len() {
            let n = self.read_at(pos, &mut buf[total..])?;
            if n == 0 {
                break;
            }
            total += n;
            pos += n as u64;
        }
        Ok(total)
    }

    /// Write all of `buf`, calling `write_at` as often as needed.
    fn write_all_at(&mut self, mut pos: u64, buf: &[u8]) -> Result<usize> {
        let mut total = 0;
        while total < buf.len() {
            let n = self.write_at(pos, &buf[total..])?;
            if n == 0 {
                return Err(std::io::Error::from(std::io::ErrorKind::WriteZero).into());
            }
            total += n;
            pos += n as u64;
        }
        Ok(total)
    }
}

impl<F: ByteFile + ?Sized> ByteFile for Box<F> {
    fn access(&self) -> Access {
        (**self).access()
    }

    fn kind(&self) -> FileKind {
        (**self).kind()
    }

    fn read_at(&mut self, pos: u64, buf: &mut [u8]) -> Result<usize> {
        (**self).read_at(pos, buf)
    }

    fn write_at(&mut self, pos: u64, buf: &[u8]) -> Result<usize> {
        (**self).write_at(pos, buf)
    }

    fn size(&self) -> Result<u64> {
        (**self).size()
    }

    fn set_size(&mut self, size: u64) -> Result<()> {
        (**self).set_size(size)
    }

    fn random_access(&self) -> Result<()> {
        (**self).random_access()
    }

    fn sys_file(&self) -> Option<(&File, u64)> {
        (**self).sys_file()
    }
}

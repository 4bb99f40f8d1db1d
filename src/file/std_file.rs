use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::Path;

use crate::core::{Error, Result};
use crate::file::{Access, ByteFile};

/// Positional I/O over an operating-system file.
#[derive(Debug)]
pub struct StdFile {
    file: File,
    access: Access,
}

impl StdFile {
    /// Open an existing file for reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new().read(true).open(path)?;
        Ok(Self::from_file(file, Access::READ_ONLY))
    }

    /// Create or truncate a file for writing.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Ok(Self::from_file(file, Access::WRITE_ONLY))
    }

    /// Open or create a file for reading and writing without truncating it.
    pub fn open_rw(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;
        Ok(Self::from_file(file, Access::READ_WRITE))
    }

    /// Wrap an already open file. `access` must match how it was opened.
    pub fn from_file(file: File, access: Access) -> Self {
        Self { file, access }
    }

    pub fn sync(&self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    pub fn into_inner(self) -> File {
        self.file
    }
}

#[cfg(unix)]
fn pread(file: &File, pos: u64, buf: &mut [u8]) -> std::io::Result<usize> {
    std::os::unix::fs::FileExt::read_at(file, buf, pos)
}

#[cfg(unix)]
fn pwrite(file: &File, pos: u64, buf: &[u8]) -> std::io::Result<usize> {
    std::os::unix::fs::FileExt::write_at(file, buf, pos)
}

#[cfg(windows)]
fn pread(file: &File, pos: u64, buf: &mut [u8]) -> std::io::Result<usize> {
    std::os::windows::fs::FileExt::seek_read(file, buf, pos)
}

#[cfg(windows)]
fn pwrite(file: &File, pos: u64, buf: &[u8]) -> std::io::Result<usize> {
    std::os::windows::fs::FileExt::seek_write(file, buf, pos)
}

impl ByteFile for StdFile {
    fn access(&self) -> Access {
        self.access
    }

    fn read_at(&mut self, pos: u64, buf: &mut [u8]) -> Result<usize> {
        if !self.access.read {
            return Err(Error::WriteOnly);
        }
        loop {
            match pread(&self.file, pos, buf) {
                Ok(n) => return Ok(n),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn write_at(&mut self, pos: u64, buf: &[u8]) -> Result<usize> {
        if !self.access.write {
            return Err(Error::ReadOnly);
        }
        loop {
            match pwrite(&self.file, pos, buf) {
                Ok(n) => return Ok(n),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn size(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn set_size(&mut self, size: u64) -> Result<()> {
        if !self.access.write {
            return Err(Error::ReadOnly);
        }
        self.file.set_len(size)?;
        Ok(())
    }

    fn sys_file(&self) -> Option<(&File, u64)> {
        Some((&self.file, 0))
    }
}

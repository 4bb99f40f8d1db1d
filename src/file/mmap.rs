use std::fs::{File, OpenOptions};
use std::path::Path;

use memmap2::{Mmap, MmapOptions};

use crate::core::{Error, Result};
use crate::file::{Access, ByteFile, FileKind};

/// Read-only memory-mapped file.
pub struct MmapFile {
    file: File,
    // Zero-length files cannot be mapped.
    map: Option<Mmap>,
}

impl MmapFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new().read(true).open(path)?;
        let len = usize::try_from(file.metadata()?.len())
            .map_err(|_| Error::Unsupported("file too large to map"))?;
        let map = if len == 0 {
            None
        } else {
            Some(unsafe { MmapOptions::new().len(len).map(&file)? })
        };
        Ok(Self { file, map })
    }

    pub fn as_slice(&self) -> &[u8] {
        self.map.as_deref().unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ByteFile for MmapFile {
    fn access(&self) -> Access {
        Access::READ_ONLY
    }

    fn kind(&self) -> FileKind {
        FileKind::Mapped
    }

    fn read_at(&mut self, pos: u64, buf: &mut [u8]) -> Result<usize> {
        let data = self.as_slice();
        let Ok(start) = usize::try_from(pos) else {
            return Ok(0);
        };
        if start >= data.len() {
            return Ok(0);
        }
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        Ok(n)
    }

    fn write_at(&mut self, _pos: u64, _buf: &[u8]) -> Result<usize> {
        Err(Error::ReadOnly)
    }

    fn size(&self) -> Result<u64> {
        Ok(self.len() as u64)
    }

    fn set_size(&mut self, _size: u64) -> Result<()> {
        Err(Error::ReadOnly)
    }

    fn sys_file(&self) -> Option<(&File, u64)> {
        Some((&self.file, 0))
    }
}

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::core::{Error, Result};
use crate::file::{Access, ByteFile, FileKind};

/// In-memory file. Clones share the same contents, so one handle can be
/// given to a queue file while another inspects the result.
#[derive(Clone, Debug)]
pub struct MemFile {
    data: Arc<Mutex<Vec<u8>>>,
    access: Access,
}

impl Default for MemFile {
    fn default() -> Self {
        Self::new()
    }
}

impl MemFile {
    /// Empty read-write file.
    pub fn new() -> Self {
        Self::from_bytes(Vec::new())
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            data: Arc::new(Mutex::new(bytes.into())),
            access: Access::READ_WRITE,
        }
    }

    /// A handle onto the same contents restricted to `access`.
    pub fn with_access(&self, access: Access) -> Self {
        Self {
            data: Arc::clone(&self.data),
            access,
        }
    }

    /// Snapshot of the current contents.
    pub fn contents(&self) -> Vec<u8> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ByteFile for MemFile {
    fn access(&self) -> Access {
        self.access
    }

    fn kind(&self) -> FileKind {
        FileKind::Memory
    }

    fn read_at(&mut self, pos: u64, buf: &mut [u8]) -> Result<usize> {
        if !self.access.read {
            return Err(Error::WriteOnly);
        }
        let data = self.lock();
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

    fn write_at(&mut self, pos: u64, buf: &[u8]) -> Result<usize> {
        if !self.access.write {
            return Err(Error::ReadOnly);
        }
        let start = usize::try_from(pos).map_err(|_| Error::InvalidArgument("offset too large"))?;
        let end = start
            .checked_add(buf.len())
            .ok_or(Error::InvalidArgument("offset too large"))?;
        let mut data = self.lock();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(buf);
        Ok(buf.len())
    }

    fn size(&self) -> Result<u64> {
        Ok(self.lock().len() as u64)
    }

    fn set_size(&mut self, size: u64) -> Result<()> {
        if !self.access.write {
            return Err(Error::ReadOnly);
        }
        let size = usize::try_from(size).map_err(|_| Error::InvalidArgument("size too large"))?;
        self.lock().resize(size, 0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_contents() {
        let file = MemFile::new();
        let mut writer = file.clone();
        writer.write_all_at(2, b"GC").unwrap();
        assert_eq!(file.contents(), b"\0\0GC");
        assert_eq!(file.size().unwrap(), 4);
    }

    #[test]
    fn reads_past_end_return_zero() {
        let mut file = MemFile::from_bytes(b"ACGT".to_vec());
        let mut buf = [0u8; 8];
        assert_eq!(file.read_at(1, &mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], b"CGT");
        assert_eq!(file.read_at(4, &mut buf).unwrap(), 0);
        assert_eq!(file.read_at(u64::MAX, &mut buf).unwrap(), 0);
    }

    #[test]
    fn access_is_enforced() {
        let file = MemFile::from_bytes(b"ACGT".to_vec());
        let mut ro = file.with_access(Access::READ_ONLY);
        let mut wo = file.with_access(Access::WRITE_ONLY);
        let mut buf = [0u8; 2];
        assert!(matches!(ro.write_at(0, b"x"), Err(Error::ReadOnly)));
        assert!(matches!(ro.set_size(0), Err(Error::ReadOnly)));
        assert!(matches!(wo.read_at(0, &mut buf), Err(Error::WriteOnly)));
        assert_eq!(wo.write_at(0, b"TT").unwrap(), 2);
        assert_eq!(file.contents(), b"TTGT");
    }

    #[test]
    fn set_size_truncates_and_extends() {
        let mut file = MemFile::from_bytes(b"ACGT".to_vec());
        file.set_size(2).unwrap();
        assert_eq!(file.contents(), b"AC");
        file.set_size(3).unwrap();
        assert_eq!(file.contents(), b"AC\0");
    }
}

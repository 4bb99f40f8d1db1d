use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::core::{Buffer, Error, PopError, PushError, Queue, Result};
use crate::file::{Access, ByteFile, FileKind};
use crate::queue_file::{discard_queued, QueueFileConfig, SealOnExit};

/// Writer that collects bytes into blocks and writes them on a background
/// thread.
///
/// `write_at` is a short write: it buffers only what fits in the current
/// block and returns that count. Use `write_all_at` to hand over a whole
/// slice. Failures of the background writes are reported by `close`.
pub struct WriteBehindFile<F: ByteFile + 'static> {
    apparent_size: Result<u64>,
    /// Block being filled on the foreground side.
    pending: Option<Buffer>,
    /// Set once a flush found the worker gone; returned by every later write.
    failed: Option<Error>,
    block_size: usize,
    timeout: Duration,
    queue: Arc<Queue<Buffer>>,
    worker: Option<JoinHandle<(F, Option<Error>)>>,
}

struct WriteBehindWorker<F> {
    file: F,
    queue: Arc<Queue<Buffer>>,
    timeout: Duration,
}

impl<F: ByteFile + 'static> WriteBehindFile<F> {
    /// Start writing behind into `dst`.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidArgument`: `dst` is not writable
    /// - `Error::Io`: the worker thread could not be spawned
    pub fn new(dst: F, config: QueueFileConfig) -> Result<Self> {
        let config = config.normalized();
        let access = dst.access();
        if !access.write {
            return Err(Error::InvalidArgument(if access.read {
                "destination file is read-only"
            } else {
                "destination file has no write permission"
            }));
        }

        let queue = Arc::new(Queue::new(config.capacity()));
        let apparent_size = dst.size();

        let worker = WriteBehindWorker {
            file: dst,
            queue: Arc::clone(&queue),
            timeout: config.timeout,
        };
        let handle = thread::Builder::new()
            .name("queue-file-write".to_string())
            .spawn(move || worker.run())?;

        log::debug!(
            "write-behind started: {} slots of {} bytes",
            queue.capacity(),
            config.block_size
        );

        Ok(Self {
            apparent_size,
            pending: None,
            failed: None,
            block_size: config.block_size,
            timeout: config.timeout,
            queue,
            worker: Some(handle),
        })
    }

    /// Number of buffers that may wait for the worker.
    pub fn queue_capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Hand the block being filled to the worker.
    ///
    /// This does not wait for the bytes to reach the destination.
    ///
    /// # Errors
    ///
    /// - `Error::TransferIncomplete`: the worker has exited
    pub fn flush(&mut self) -> Result<()> {
        if let Some(err) = &self.failed {
            return Err(err.clone());
        }
        self.flush_pending()
    }

    /// Flush, seal the queue, wait for the worker to write everything queued
    /// and release the destination.
    ///
    /// # Errors
    ///
    /// The first of: a failed final flush, a failed background write, or a
    /// panicked worker.
    pub fn close(mut self) -> Result<()> {
        self.shutdown().map(drop)
    }

    /// Like [`close`](Self::close), but hand the destination back.
    pub fn into_inner(mut self) -> Result<F> {
        self.shutdown()?
            .ok_or(Error::Unsupported("destination already released"))
    }

    fn shutdown(&mut self) -> Result<Option<F>> {
        let Some(handle) = self.worker.take() else {
            return Ok(None);
        };

        let flushed = match self.failed.clone() {
            Some(err) => {
                self.pending = None;
                Err(err)
            }
            None => self.flush_pending(),
        };

        self.queue.seal();
        let joined = handle.join();

        let discarded = discard_queued(&self.queue);
        if discarded > 0 {
            log::warn!("write-behind closed with {discarded} unwritten buffers");
        }

        let (file, write_err) = joined.map_err(|_| Error::WorkerPanicked)?;
        flushed?;
        match write_err {
            Some(err) => Err(err),
            None => Ok(Some(file)),
        }
    }

    fn flush_pending(&mut self) -> Result<()> {
        let Some(mut buffer) = self.pending.take() else {
            return Ok(());
        };
        if buffer.is_empty() {
            return Ok(());
        }
        loop {
            match self.queue.push(buffer, self.timeout) {
                Ok(()) => return Ok(()),
                Err(PushError::Timeout(rejected)) => {
                    log::trace!("write-behind push timed out, retrying");
                    buffer = rejected;
                }
                Err(PushError::Sealed(lost)) => {
                    log::error!(
                        "write-behind worker is gone; dropping {} bytes at offset {}",
                        lost.len(),
                        lost.pos()
                    );
                    self.failed = Some(Error::TransferIncomplete);
                    return Err(Error::TransferIncomplete);
                }
            }
        }
    }
}

impl<F: ByteFile + 'static> ByteFile for WriteBehindFile<F> {
    fn access(&self) -> Access {
        Access::WRITE_ONLY
    }

    fn kind(&self) -> FileKind {
        FileKind::Fifo
    }

    fn read_at(&mut self, _pos: u64, _buf: &mut [u8]) -> Result<usize> {
        Err(Error::WriteOnly)
    }

    /// Buffer as much of `buf` as fits in the current block.
    ///
    /// A write that does not continue the current block, or finds it full,
    /// first hands that block to the worker and starts a new one at `pos`.
    /// A write landing inside the pending block is therefore stored at its
    /// own offset, not appended after the bytes already buffered.
    fn write_at(&mut self, pos: u64, buf: &[u8]) -> Result<usize> {
        if let Some(err) = &self.failed {
            return Err(err.clone());
        }
        if buf.is_empty() {
            return Ok(0);
        }

        let breaks_block = self
            .pending
            .as_ref()
            .is_some_and(|pending| pos != pending.end() || pending.remaining() == 0);
        if breaks_block {
            self.flush_pending()?;
        }

        let mut pending = match self.pending.take() {
            Some(pending) => pending,
            None => Buffer::allocate(pos, self.block_size)?,
        };
        let n = pending.append(buf);
        self.pending = Some(pending);
        Ok(n)
    }

    fn size(&self) -> Result<u64> {
        self.apparent_size.clone()
    }

    fn set_size(&mut self, _size: u64) -> Result<()> {
        Err(Error::Unsupported("set_size on a write-behind file"))
    }

    fn random_access(&self) -> Result<()> {
        Err(Error::Unsupported("random access to a write-behind file"))
    }
}

impl<F: ByteFile + 'static> Drop for WriteBehindFile<F> {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            log::error!("write-behind shutdown failed: {err}");
        }
    }
}

impl<F: ByteFile> WriteBehindWorker<F> {
    /// Write popped blocks until the queue is sealed and drained.
    ///
    /// A failed write is logged and the loop keeps going; the first failure
    /// is returned with the file.
    fn run(mut self) -> (F, Option<Error>) {
        let _seal = SealOnExit(Arc::clone(&self.queue));
        let mut first_error = None;
        let mut written = 0u64;
        loop {
            let buffer = match self.queue.pop(self.timeout) {
                Ok(buffer) => buffer,
                Err(PopError::Timeout) => continue,
                Err(PopError::Done) => break,
            };
            if buffer.is_terminal() {
                break;
            }
            match self.file.write_all_at(buffer.pos(), buffer.data()) {
                Ok(n) => written += n as u64,
                Err(err) => {
                    log::error!(
                        "write-behind failed to write {} bytes at offset {}: {err}",
                        buffer.len(),
                        buffer.pos()
                    );
                    first_error.get_or_insert(err);
                }
            }
        }
        log::debug!("write-behind worker exiting after {written} bytes");
        (self.file, first_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::MemFile;

    fn config(block_size: usize, blocks: usize) -> QueueFileConfig {
        QueueFileConfig::blocks(blocks, block_size).with_timeout(Duration::from_millis(10))
    }

    #[test]
    fn write_is_short_at_block_boundary() {
        let dst = MemFile::new();
        let mut file = WriteBehindFile::new(dst.clone(), config(4, 4)).unwrap();
        assert_eq!(file.write_at(0, b"ABCDEFGH").unwrap(), 4);
        assert_eq!(file.write_at(4, b"EFGH").unwrap(), 4);
        file.close().unwrap();
        assert_eq!(dst.contents(), b"ABCDEFGH");
    }

    #[test]
    fn partial_block_is_written_on_close() {
        let dst = MemFile::new();
        let mut file = WriteBehindFile::new(dst.clone(), config(8, 2)).unwrap();
        assert_eq!(file.write_all_at(0, b"ACG").unwrap(), 3);
        file.close().unwrap();
        assert_eq!(dst.contents(), b"ACG");
    }

    #[test]
    fn non_contiguous_write_starts_new_block() {
        let dst = MemFile::new();
        let mut file = WriteBehindFile::new(dst.clone(), config(8, 2)).unwrap();
        file.write_all_at(0, b"AAAA").unwrap();
        file.write_all_at(6, b"CC").unwrap();
        file.write_all_at(1, b"GG").unwrap();
        file.close().unwrap();
        assert_eq!(dst.contents(), b"AGGA\0\0CC");
    }

    #[test]
    fn flush_hands_block_to_worker() {
        let dst = MemFile::new();
        let mut file = WriteBehindFile::new(dst.clone(), config(8, 2)).unwrap();
        file.write_all_at(0, b"TTAG").unwrap();
        file.flush().unwrap();
        file.flush().unwrap();
        let dst = file.into_inner().unwrap();
        assert_eq!(dst.contents(), b"TTAG");
    }

    #[test]
    fn refuses_read_only_destination() {
        let dst = MemFile::new().with_access(Access::READ_ONLY);
        let err = WriteBehindFile::new(dst, config(4, 1)).err().unwrap();
        assert!(matches!(err, Error::InvalidArgument("destination file is read-only")));

        let dst = MemFile::new().with_access(Access::NONE);
        let err = WriteBehindFile::new(dst, config(4, 1)).err().unwrap();
        assert!(matches!(
            err,
            Error::InvalidArgument("destination file has no write permission")
        ));
    }

    #[test]
    fn unsupported_operations() {
        let mut file = WriteBehindFile::new(MemFile::from_bytes(b"xy".to_vec()), config(4, 1)).unwrap();
        let mut buf = [0u8; 1];
        assert_eq!(file.size().unwrap(), 2);
        assert!(matches!(file.read_at(0, &mut buf), Err(Error::WriteOnly)));
        assert!(matches!(file.set_size(0), Err(Error::Unsupported(_))));
        assert!(matches!(file.random_access(), Err(Error::Unsupported(_))));
        assert!(file.sys_file().is_none());
        assert_eq!(file.write_at(0, &[]).unwrap(), 0);
    }

    #[test]
    fn drop_without_close_still_writes() {
        let dst = MemFile::new();
        {
            let mut file = WriteBehindFile::new(dst.clone(), config(4, 1)).unwrap();
            file.write_all_at(0, b"GATTACA").unwrap();
        }
        assert_eq!(dst.contents(), b"GATTACA");
    }
}

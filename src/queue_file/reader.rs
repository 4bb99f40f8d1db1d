use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::core::{Buffer, Error, Payload, PopError, PushError, Queue, Result};
use crate::file::{Access, ByteFile, FileKind};
use crate::queue_file::{discard_queued, QueueFileConfig, SealOnExit};

/// Sequential reader that fetches blocks of the source on a background thread.
///
/// Reads must move forward: a position before the start of the cached block
/// is rejected with `Error::BackingUp`. Once end of stream or an error has
/// been seen, every later read returns it again.
pub struct ReadAheadFile<F: ByteFile + 'static> {
    /// Size of the source when opened, or the error asking for it produced.
    apparent_size: Result<u64>,
    start_pos: u64,
    /// The one block held on the foreground side.
    cached: Option<Buffer>,
    /// `Ok(())` for end of stream.
    terminal: Option<Result<()>>,
    timeout: Duration,
    queue: Arc<Queue<Buffer>>,
    worker: Option<JoinHandle<F>>,
}

struct ReadAheadWorker<F> {
    file: F,
    queue: Arc<Queue<Buffer>>,
    start_pos: u64,
    block_size: usize,
    timeout: Duration,
}

impl<F: ByteFile + 'static> ReadAheadFile<F> {
    /// Start reading `src` ahead from `start_pos`.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidArgument`: `src` is not readable
    /// - `Error::Unsupported`: `start_pos` is non-zero and `src` is not random access
    /// - `Error::Io`: the worker thread could not be spawned
    pub fn new(src: F, start_pos: u64, config: QueueFileConfig) -> Result<Self> {
        let config = config.normalized();
        let access = src.access();
        if !access.read {
            return Err(Error::InvalidArgument(if access.write {
                "source file is write-only"
            } else {
                "source file has no read permission"
            }));
        }
        if start_pos != 0 {
            src.random_access()?;
        }

        let queue = Arc::new(Queue::new(config.capacity()));
        let apparent_size = src.size();

        let worker = ReadAheadWorker {
            file: src,
            queue: Arc::clone(&queue),
            start_pos,
            block_size: config.block_size,
            timeout: config.timeout,
        };
        let handle = thread::Builder::new()
            .name("queue-file-read".to_string())
            .spawn(move || worker.run())?;

        log::debug!(
            "read-ahead started at offset {start_pos}: {} slots of {} bytes",
            queue.capacity(),
            config.block_size
        );

        Ok(Self {
            apparent_size,
            start_pos,
            cached: None,
            terminal: None,
            timeout: config.timeout,
            queue,
            worker: Some(handle),
        })
    }

    pub fn start_pos(&self) -> u64 {
        self.start_pos
    }

    /// Number of buffers the worker may run ahead.
    pub fn queue_capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Seal the queue, discard pending blocks, join the worker and release
    /// the source.
    pub fn close(mut self) -> Result<()> {
        self.shutdown().map(drop)
    }

    /// Like [`close`](Self::close), but hand the source back.
    pub fn into_inner(mut self) -> Result<F> {
        self.shutdown()?
            .ok_or(Error::Unsupported("source already released"))
    }

    fn shutdown(&mut self) -> Result<Option<F>> {
        let Some(handle) = self.worker.take() else {
            return Ok(None);
        };
        self.queue.seal();
        let discarded = discard_queued(&self.queue);
        self.cached = None;
        log::debug!("read-ahead closing: discarded {discarded} queued buffers");
        handle.join().map(Some).map_err(|_| Error::WorkerPanicked)
    }

    fn cached_contains(&self, pos: u64) -> bool {
        self.cached.as_ref().is_some_and(|b| b.contains(pos))
    }

    /// Pop until the cached block contains `pos`. `Ok(false)` is end of stream.
    fn fetch(&mut self, pos: u64) -> Result<bool> {
        loop {
            let buffer = match self.queue.pop(self.timeout) {
                Ok(buffer) => buffer,
                Err(PopError::Timeout) => {
                    log::trace!("read-ahead pop timed out, retrying");
                    continue;
                }
                Err(PopError::Done) => {
                    log::trace!("read-ahead worker is done");
                    self.terminal = Some(Ok(()));
                    return Ok(false);
                }
            };

            if buffer.is_terminal() {
                self.cached = None;
                return match buffer.into_payload() {
                    Payload::Error(err) => {
                        log::debug!("read-ahead delivered error: {err}");
                        self.terminal = Some(Err(err.clone()));
                        Err(err)
                    }
                    _ => {
                        self.terminal = Some(Ok(()));
                        Ok(false)
                    }
                };
            }

            let found = buffer.contains(pos);
            self.cached = Some(buffer);
            if found {
                return Ok(true);
            }
        }
    }
}

impl<F: ByteFile + 'static> ByteFile for ReadAheadFile<F> {
    fn access(&self) -> Access {
        Access::READ_ONLY
    }

    fn kind(&self) -> FileKind {
        FileKind::Fifo
    }

    /// Copy bytes at `pos` out of the read-ahead blocks.
    ///
    /// Blocks until `buf` is full or the stream ends. A terminal condition
    /// met after some bytes were copied is returned by the next call.
    /// Before the first block is cached, positions below the start offset
    /// are rejected as backing up.
    fn read_at(&mut self, pos: u64, buf: &mut [u8]) -> Result<usize> {
        if let Some(terminal) = &self.terminal {
            return terminal.clone().map(|()| 0);
        }
        let floor = self.cached.as_ref().map_or(self.start_pos, Buffer::pos);
        if pos < floor {
            log::debug!("read-ahead: attempt to back up from {floor} to {pos}");
            return Err(Error::BackingUp {
                cached: floor,
                requested: pos,
            });
        }

        let mut pos = pos;
        let mut total = 0;
        while total < buf.len() {
            if !self.cached_contains(pos) {
                match self.fetch(pos) {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(_) if total > 0 => break,
                    Err(err) => return Err(err),
                }
            }
            let Some(cached) = self.cached.as_ref() else {
                break;
            };
            let src = cached.data_from(pos);
            let n = src.len().min(buf.len() - total);
            buf[total..total + n].copy_from_slice(&src[..n]);
            total += n;
            pos += n as u64;
        }
        Ok(total)
    }

    fn write_at(&mut self, _pos: u64, _buf: &[u8]) -> Result<usize> {
        Err(Error::ReadOnly)
    }

    fn size(&self) -> Result<u64> {
        self.apparent_size.clone()
    }

    fn set_size(&mut self, _size: u64) -> Result<()> {
        Err(Error::Unsupported("set_size on a read-ahead file"))
    }

    fn random_access(&self) -> Result<()> {
        Err(Error::Unsupported("random access to a read-ahead file"))
    }
}

impl<F: ByteFile + 'static> Drop for ReadAheadFile<F> {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            log::warn!("read-ahead shutdown failed: {err}");
        }
    }
}

impl<F: ByteFile> ReadAheadWorker<F> {
    fn run(mut self) -> F {
        let _seal = SealOnExit(Arc::clone(&self.queue));
        let mut pos = self.start_pos;
        let mut deferred = None;
        loop {
            let (buffer, last) = match deferred.take() {
                Some(err) => (Buffer::error(pos, err), true),
                None => self.next_block(pos, &mut deferred),
            };
            let advance = buffer.len() as u64;
            if !self.push(buffer) || last {
                break;
            }
            pos += advance;
        }
        log::debug!("read-ahead worker exiting at offset {pos}");
        self.file
    }

    /// Read the block at `pos`. The flag is set when it is the last one.
    ///
    /// An error after part of the block was read is parked in `deferred` so
    /// the bytes already read are delivered before it.
    fn next_block(&mut self, pos: u64, deferred: &mut Option<Error>) -> (Buffer, bool) {
        let mut buffer = match Buffer::allocate(pos, self.block_size) {
            Ok(buffer) => buffer,
            Err(err) => {
                log::warn!("read-ahead failed to allocate {} byte buffer", self.block_size);
                return (Buffer::error(pos, err), true);
            }
        };

        let file = &mut self.file;
        let filled = buffer.fill_with(|dst| {
            let mut total = 0;
            while total < dst.len() {
                match file.read_at(pos + total as u64, &mut dst[total..]) {
                    Ok(0) => break,
                    Ok(n) => total += n,
                    Err(err) if total > 0 => {
                        *deferred = Some(err);
                        break;
                    }
                    Err(err) => return Err(err),
                }
            }
            Ok(total)
        });

        match filled {
            Ok(0) => (Buffer::end_of_stream(pos), true),
            Ok(n) => {
                log::trace!("read-ahead read {n} bytes at offset {pos}");
                (buffer, false)
            }
            Err(err) => {
                log::debug!("read-ahead read failed at offset {pos}: {err}");
                (Buffer::error(pos, err), true)
            }
        }
    }

    /// Push until accepted. `false` means the consumer sealed the queue.
    fn push(&self, mut buffer: Buffer) -> bool {
        loop {
            match self.queue.push(buffer, self.timeout) {
                Ok(()) => return true,
                Err(PushError::Timeout(rejected)) => {
                    log::trace!("read-ahead push timed out, retrying");
                    buffer = rejected;
                }
                Err(PushError::Sealed(_)) => {
                    log::debug!("read-ahead queue sealed by consumer");
                    return false;
                }
            }
        }
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
    fn reads_whole_source_in_small_steps() {
        let src = MemFile::from_bytes(b"ABCDEFGHIJ".to_vec());
        let mut file = ReadAheadFile::new(src, 0, config(4, 4)).unwrap();

        let mut out = Vec::new();
        let mut pos = 0;
        let mut buf = [0u8; 3];
        loop {
            let n = file.read_at(pos, &mut buf).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
            pos += n as u64;
        }
        assert_eq!(out, b"ABCDEFGHIJ");
        file.close().unwrap();
    }

    #[test]
    fn starts_at_requested_offset() {
        let src = MemFile::from_bytes(b"ABCDEFGHIJ".to_vec());
        let mut file = ReadAheadFile::new(src, 6, config(4, 2)).unwrap();
        let mut buf = [0u8; 2];
        assert_eq!(file.read_at(6, &mut buf).unwrap(), 2);
        assert_eq!(&buf, b"GH");
        assert!(matches!(
            file.read_at(5, &mut buf),
            Err(Error::BackingUp { .. })
        ));
    }

    #[test]
    fn reading_before_start_is_backing_up() {
        let src = MemFile::from_bytes(b"ABCDEFGHIJ".to_vec());
        let mut file = ReadAheadFile::new(src, 4, config(4, 2)).unwrap();
        let mut buf = [0u8; 2];
        let err = file.read_at(1, &mut buf).unwrap_err();
        assert!(matches!(err, Error::BackingUp { cached: 4, requested: 1 }));
    }

    #[test]
    fn skipping_forward_discards_blocks() {
        let src = MemFile::from_bytes(b"ABCDEFGHIJKLMNOP".to_vec());
        let mut file = ReadAheadFile::new(src, 0, config(4, 2)).unwrap();
        let mut buf = [0u8; 2];
        assert_eq!(file.read_at(13, &mut buf).unwrap(), 2);
        assert_eq!(&buf, b"NO");
    }

    #[test]
    fn empty_source_is_immediate_end_of_stream() {
        let mut file = ReadAheadFile::new(MemFile::new(), 0, config(4, 1)).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(file.read_at(0, &mut buf).unwrap(), 0);
        assert_eq!(file.read_at(0, &mut buf).unwrap(), 0);
    }

    #[test]
    fn empty_request_reads_nothing() {
        let src = MemFile::from_bytes(b"ABCD".to_vec());
        let mut file = ReadAheadFile::new(src, 0, config(4, 1)).unwrap();
        assert_eq!(file.read_at(0, &mut []).unwrap(), 0);
    }

    #[test]
    fn refuses_write_only_source() {
        let src = MemFile::new().with_access(Access::WRITE_ONLY);
        let err = ReadAheadFile::new(src, 0, config(4, 1)).err().unwrap();
        assert!(matches!(err, Error::InvalidArgument("source file is write-only")));

        let src = MemFile::new().with_access(Access::NONE);
        let err = ReadAheadFile::new(src, 0, config(4, 1)).err().unwrap();
        assert!(matches!(err, Error::InvalidArgument("source file has no read permission")));
    }

    #[test]
    fn unsupported_operations() {
        let src = MemFile::from_bytes(b"ABCD".to_vec());
        let mut file = ReadAheadFile::new(src, 0, config(4, 1)).unwrap();
        assert_eq!(file.size().unwrap(), 4);
        assert!(matches!(file.set_size(0), Err(Error::Unsupported(_))));
        assert!(matches!(file.random_access(), Err(Error::Unsupported(_))));
        assert!(matches!(file.write_at(0, b"x"), Err(Error::ReadOnly)));
        assert!(file.sys_file().is_none());
        assert_eq!(file.kind(), FileKind::Fifo);
    }

    #[test]
    fn into_inner_returns_source() {
        let src = MemFile::from_bytes(b"ABCDEFGH".to_vec());
        let mut file = ReadAheadFile::new(src, 0, config(2, 1)).unwrap();
        let mut buf = [0u8; 1];
        file.read_at(0, &mut buf).unwrap();
        let src = file.into_inner().unwrap();
        assert_eq!(src.contents(), b"ABCDEFGH");
    }
}

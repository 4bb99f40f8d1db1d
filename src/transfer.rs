//! Sequential copy between byte files.

use std::time::{Duration, Instant};

use crate::core::{Error, Result};
use crate::file::ByteFile;

const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;
const PROGRESS_EVERY_BYTES: u64 = 256 * 1024 * 1024;

/// Statistics for a copy run.
#[derive(Debug, Clone, Default)]
pub struct TransferStats {
    pub bytes: u64,
    pub reads: u64,
    /// CRC-32 of every byte copied.
    pub crc32: u32,
    pub duration: Duration,
}

impl TransferStats {
    /// Bytes per second.
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.bytes as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }
}

/// Copies a source to a destination in forward order, the access pattern
/// queue files are built for.
#[derive(Clone, Copy, Debug)]
pub struct Transfer {
    chunk_size: usize,
    src_pos: u64,
    dst_pos: u64,
}

impl Default for Transfer {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            src_pos: 0,
            dst_pos: 0,
        }
    }
}

impl Transfer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes requested per read. Zero is rejected by [`run`](Self::run).
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Offset in the source to start from.
    pub fn from_offset(mut self, pos: u64) -> Self {
        self.src_pos = pos;
        self
    }

    /// Offset in the destination to write the first byte at.
    pub fn to_offset(mut self, pos: u64) -> Self {
        self.dst_pos = pos;
        self
    }

    /// Copy until the source reports end of file.
    pub fn run<R, W>(&self, src: &mut R, dst: &mut W) -> Result<TransferStats>
    where
        R: ByteFile + ?Sized,
        W: ByteFile + ?Sized,
    {
        if self.chunk_size == 0 {
            return Err(Error::InvalidArgument("chunk size must be non-zero"));
        }
        let start = Instant::now();
        let mut stats = TransferStats::default();
        let mut hasher = crc32fast::Hasher::new();
        let mut buf = vec![0u8; self.chunk_size];
        let mut next_progress = PROGRESS_EVERY_BYTES;

        loop {
            let n = src.read_at(self.src_pos + stats.bytes, &mut buf)?;
            if n == 0 {
                break;
            }
            dst.write_all_at(self.dst_pos + stats.bytes, &buf[..n])?;
            hasher.update(&buf[..n]);
            stats.reads += 1;
            stats.bytes += n as u64;

            if stats.bytes >= next_progress {
                next_progress += PROGRESS_EVERY_BYTES;
                log::info!(
                    "Copied {} MiB ({:.1} MiB/sec)",
                    stats.bytes >> 20,
                    stats.bytes as f64 / start.elapsed().as_secs_f64() / (1024.0 * 1024.0)
                );
            }
        }

        stats.crc32 = hasher.finalize();
        stats.duration = start.elapsed();
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::MemFile;

    #[test]
    fn copies_bytes_and_checksums() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let mut src = MemFile::from_bytes(data.clone());
        let dst = MemFile::new();

        let stats = Transfer::new()
            .chunk_size(1000)
            .run(&mut src, &mut dst.clone())
            .unwrap();

        assert_eq!(stats.bytes, 10_000);
        assert_eq!(stats.reads, 10);
        assert_eq!(stats.crc32, crc32fast::hash(&data));
        assert_eq!(dst.contents(), data);
    }

    #[test]
    fn honours_offsets() {
        let mut src = MemFile::from_bytes(b"NNNNACGT".to_vec());
        let dst = MemFile::new();
        let stats = Transfer::new()
            .from_offset(4)
            .to_offset(2)
            .run(&mut src, &mut dst.clone())
            .unwrap();
        assert_eq!(stats.bytes, 4);
        assert_eq!(dst.contents(), b"\0\0ACGT");
    }

    #[test]
    fn zero_chunk_is_rejected() {
        let mut src = MemFile::new();
        let mut dst = MemFile::new();
        let err = Transfer::new().chunk_size(0).run(&mut src, &mut dst).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn throughput_of_empty_run_is_zero() {
        assert_eq!(TransferStats::default().throughput(), 0.0);
    }
}

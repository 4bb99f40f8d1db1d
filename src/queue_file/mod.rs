//! Queue files: byte-file decorators that move I/O onto a background thread.
//!
//! A queue file owns exactly one worker thread, one bounded [`Queue`] of
//! [`Buffer`]s and the file it wraps. The wrapped file is moved into the
//! worker for the worker's whole life and handed back when it is joined, so
//! only one thread ever touches it at a time.
//!
//! # Read-ahead
//!
//! ```text
//! ┌───────────────┐   push   ┌─────────┐   pop   ┌────────────────┐
//! │ source file   │ ───────> │  queue  │ ──────> │ read_at caller │
//! │ (worker)      │          │         │         │ (foreground)   │
//! └───────────────┘          └─────────┘         └────────────────┘
//! ```
//!
//! # Write-behind
//!
//! ```text
//! ┌─────────────────┐   push   ┌─────────┐   pop   ┌───────────────┐
//! │ write_at caller │ ───────> │  queue  │ ──────> │ sink file     │
//! │ (foreground)    │          │         │         │ (worker)      │
//! └─────────────────┘          └─────────┘         └───────────────┘
//! ```
//!
//! Shutdown is structural: the foreground seals the queue, the worker wakes,
//! drains or drops what is left and exits, and the foreground joins it. The
//! queue timeout only makes blocked sides recheck; it is retried forever.

use std::sync::Arc;
use std::time::Duration;

use crate::core::{capacity_for, Buffer, Queue, Result};
use crate::file::ByteFile;

pub mod reader;
pub mod writer;

pub use reader::ReadAheadFile;
pub use writer::WriteBehindFile;

pub const DEFAULT_BLOCK_SIZE: usize = 64 * 1024;
pub const DEFAULT_TIMEOUT_MS: u64 = 150;
/// Default queue budget, in blocks.
pub const DEFAULT_QUEUE_BLOCKS: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueFileConfig {
    /// Bytes the fast side may run ahead of the slow side.
    pub queue_bytes: usize,
    /// Size of each buffer moved through the queue. Zero selects the default.
    pub block_size: usize,
    /// How long a blocked push or pop waits before rechecking. Zero selects the default.
    pub timeout: Duration,
}

impl Default for QueueFileConfig {
    fn default() -> Self {
        Self {
            queue_bytes: DEFAULT_BLOCK_SIZE * DEFAULT_QUEUE_BLOCKS,
            block_size: DEFAULT_BLOCK_SIZE,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

impl QueueFileConfig {
    pub fn new(queue_bytes: usize, block_size: usize, timeout_ms: u32) -> Self {
        Self {
            queue_bytes,
            block_size,
            timeout: Duration::from_millis(u64::from(timeout_ms)),
        }
    }

    /// `blocks` buffers of `block_size` bytes each.
    pub fn blocks(blocks: usize, block_size: usize) -> Self {
        Self {
            queue_bytes: blocks.saturating_mul(block_size),
            block_size,
            ..Self::default()
        }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    /// Replace zero block size and timeout with their defaults.
    pub fn normalized(self) -> Self {
        Self {
            queue_bytes: self.queue_bytes,
            block_size: if self.block_size == 0 {
                DEFAULT_BLOCK_SIZE
            } else {
                self.block_size
            },
            timeout: if self.timeout.is_zero() {
                Duration::from_millis(DEFAULT_TIMEOUT_MS)
            } else {
                self.timeout
            },
        }
    }

    /// Queue slots after normalisation.
    pub fn capacity(&self) -> usize {
        let config = self.normalized();
        capacity_for(config.queue_bytes, config.block_size)
    }
}

/// Make a queue file that reads `src` ahead on a background thread,
/// starting at `pos`.
///
/// `queue_bytes` bounds how far the worker runs ahead of the reader.
/// Zero `block_size` or `timeout_ms` selects the defaults.
///
/// # Errors
///
/// - `Error::InvalidArgument`: `src` is not readable
/// - `Error::Unsupported`: `pos` is non-zero and `src` is not random access
/// - `Error::Io`: the worker thread could not be spawned
pub fn make_read<F: ByteFile + 'static>(
    pos: u64,
    src: F,
    queue_bytes: usize,
    block_size: usize,
    timeout_ms: u32,
) -> Result<ReadAheadFile<F>> {
    ReadAheadFile::new(
        src,
        pos,
        QueueFileConfig::new(queue_bytes, block_size, timeout_ms),
    )
}

/// Make a queue file that writes `dst` behind on a background thread.
///
/// # Errors
///
/// - `Error::InvalidArgument`: `dst` is not writable
/// - `Error::Io`: the worker thread could not be spawned
pub fn make_write<F: ByteFile + 'static>(
    dst: F,
    queue_bytes: usize,
    block_size: usize,
    timeout_ms: u32,
) -> Result<WriteBehindFile<F>> {
    WriteBehindFile::new(dst, QueueFileConfig::new(queue_bytes, block_size, timeout_ms))
}

/// Seals the queue when the worker exits, including by panic, so the
/// foreground never waits on a dead peer.
struct SealOnExit(Arc<Queue<Buffer>>);

impl Drop for SealOnExit {
    fn drop(&mut self) {
        self.0.seal();
    }
}

/// Drop everything still queued, returning how many buffers were discarded.
fn discard_queued(queue: &Queue<Buffer>) -> usize {
    let mut discarded = 0;
    while queue.try_pop().is_some() {
        discarded += 1;
    }
    discarded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_values_select_defaults() {
        let config = QueueFileConfig::new(0, 0, 0).normalized();
        assert_eq!(config.block_size, DEFAULT_BLOCK_SIZE);
        assert_eq!(config.timeout, Duration::from_millis(DEFAULT_TIMEOUT_MS));
        assert_eq!(config.capacity(), 1);
    }

    #[test]
    fn default_budget_is_ten_blocks() {
        let config = QueueFileConfig::default();
        assert_eq!(config.capacity(), DEFAULT_QUEUE_BLOCKS);
    }

    #[test]
    fn capacity_rounds_partial_blocks_up() {
        assert_eq!(QueueFileConfig::new(10, 4, 0).capacity(), 3);
        assert_eq!(QueueFileConfig::blocks(4, 4).capacity(), 4);
        let config = QueueFileConfig::blocks(2, 8).with_timeout(Duration::from_millis(5));
        assert_eq!(config.timeout, Duration::from_millis(5));
        assert_eq!(config.queue_bytes, 16);
    }
}

//! Background-thread queue files for serial genomics I/O.
//!
//! A queue file wraps another byte file and moves its I/O onto a dedicated
//! worker thread: [`ReadAheadFile`] fetches blocks of the source before they
//! are asked for, [`WriteBehindFile`] writes blocks out after the caller has
//! moved on. Blocks travel through a bounded queue, so the faster side is
//! throttled by the slower one.
//!
//! ```no_run
//! use queuefile::{ByteFile, QueueFileConfig, ReadAheadFile, StdFile};
//!
//! # fn main() -> queuefile::Result<()> {
//! let src = StdFile::open("reads.fastq")?;
//! let mut file = ReadAheadFile::new(src, 0, QueueFileConfig::default())?;
//! let mut buf = vec![0u8; 4096];
//! let mut pos = 0;
//! loop {
//!     let n = file.read_at(pos, &mut buf)?;
//!     if n == 0 {
//!         break;
//!     }
//!     pos += n as u64;
//! }
//! file.close()?;
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod file;
pub mod queue_file;
pub mod transfer;

pub use crate::core::{Error, Result};
pub use file::{Access, ByteFile, FileKind, MemFile, MmapFile, StdFile, StreamFile};
pub use queue_file::{make_read, make_write, QueueFileConfig, ReadAheadFile, WriteBehindFile};
pub use transfer::{Transfer, TransferStats};

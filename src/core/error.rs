use std::sync::Arc;

use thiserror::Error;

/// Errors surfaced by queue files and the byte-file collaborators.
///
/// The type is `Clone` so a terminal condition observed once can be
/// returned again on every later call.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Bad construction argument, e.g. a file opened in the wrong direction.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// Write attempted on a file that only reads.
    #[error("file is read-only")]
    ReadOnly,
    /// Read attempted on a file that only writes.
    #[error("file is write-only")]
    WriteOnly,
    #[error("out of memory allocating {0} byte buffer")]
    OutOfMemory(usize),
    /// A read asked for a position before the start of the cached block.
    #[error("attempt to back up from {cached} to {requested}")]
    BackingUp { cached: u64, requested: u64 },
    /// The background writer exited before accepting a buffer.
    #[error("transfer incomplete: background writer is gone")]
    TransferIncomplete,
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
    #[error("background worker panicked")]
    WorkerPanicked,
    #[error("io error: {0}")]
    Io(Arc<std::io::Error>),
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::Io(Arc::new(value))
    }
}

impl Error {
    /// True for errors reported by the operating system or the underlying file.
    pub fn is_io(&self) -> bool {
        matches!(self, Error::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

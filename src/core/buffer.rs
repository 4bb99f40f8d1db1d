//! Fixed-capacity blocks that travel through the queue.
//!
//! A `Buffer` is owned by exactly one side at a time: whoever allocated it,
//! the queue while in flight, or the consumer. It is freed when that owner
//! drops it.

use crate::core::{Error, Result};

/// What a buffer carries.
#[derive(Debug)]
pub enum Payload {
    /// Valid bytes; `Vec::len` is the valid length, capacity is the block size.
    Data(Vec<u8>),
    /// No more data follows.
    EndOfStream,
    /// The producer hit a permanent error; no more data follows.
    Error(Error),
}

/// A block of file data tagged with its file offset.
#[derive(Debug)]
pub struct Buffer {
    pos: u64,
    payload: Payload,
}

impl Buffer {
    /// Allocate an empty data buffer able to hold `capacity` bytes.
    ///
    /// # Errors
    ///
    /// - `Error::OutOfMemory` if the allocation cannot be satisfied.
    pub fn allocate(pos: u64, capacity: usize) -> Result<Self> {
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(capacity)
            .map_err(|_| Error::OutOfMemory(capacity))?;
        Ok(Self {
            pos,
            payload: Payload::Data(bytes),
        })
    }

    pub fn end_of_stream(pos: u64) -> Self {
        Self {
            pos,
            payload: Payload::EndOfStream,
        }
    }

    pub fn error(pos: u64, err: Error) -> Self {
        Self {
            pos,
            payload: Payload::Error(err),
        }
    }

    pub fn pos(&self) -> u64 {
        self.pos
    }

    /// Number of valid bytes. Terminal buffers are always empty.
    pub fn len(&self) -> usize {
        match &self.payload {
            Payload::Data(bytes) => bytes.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        match &self.payload {
            Payload::Data(bytes) => bytes.capacity(),
            _ => 0,
        }
    }

    /// Bytes that can still be appended.
    pub fn remaining(&self) -> usize {
        self.capacity() - self.len()
    }

    /// One past the last valid offset.
    pub fn end(&self) -> u64 {
        self.pos + self.len() as u64
    }

    /// True iff `pos <= offset < pos + len`.
    pub fn contains(&self, offset: u64) -> bool {
        self.pos <= offset && offset < self.end()
    }

    /// End of stream, an error, or a data buffer with no bytes.
    pub fn is_terminal(&self) -> bool {
        match &self.payload {
            Payload::Data(bytes) => bytes.is_empty(),
            _ => true,
        }
    }

    pub fn data(&self) -> &[u8] {
        match &self.payload {
            Payload::Data(bytes) => bytes,
            _ => &[],
        }
    }

    /// Bytes from `offset` to the end of the buffer, empty if not contained.
    pub fn data_from(&self, offset: u64) -> &[u8] {
        if !self.contains(offset) {
            return &[];
        }
        &self.data()[(offset - self.pos) as usize..]
    }

    /// Append as much of `src` as fits and return the count appended.
    pub fn append(&mut self, src: &[u8]) -> usize {
        match &mut self.payload {
            Payload::Data(bytes) => {
                let n = src.len().min(bytes.capacity() - bytes.len());
                bytes.extend_from_slice(&src[..n]);
                n
            }
            _ => 0,
        }
    }

    /// Fill the buffer's whole capacity with `fill` and keep the bytes it reports.
    ///
    /// `fill` receives a zeroed slice the size of the capacity and returns the
    /// number of valid bytes it produced.
    pub fn fill_with<F>(&mut self, fill: F) -> Result<usize>
    where
        F: FnOnce(&mut [u8]) -> Result<usize>,
    {
        let bytes = match &mut self.payload {
            Payload::Data(bytes) => bytes,
            _ => return Err(Error::Unsupported("fill of a terminal buffer")),
        };
        let cap = bytes.capacity();
        bytes.clear();
        bytes.resize(cap, 0);
        match fill(bytes.as_mut_slice()) {
            Ok(n) => {
                bytes.truncate(n.min(cap));
                Ok(n.min(cap))
            }
            Err(err) => {
                bytes.clear();
                Err(err)
            }
        }
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn into_payload(self) -> Payload {
        self.payload
    }
}

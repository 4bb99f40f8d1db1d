//! Building blocks shared by the read-ahead and write-behind queue files.

pub mod buffer;
pub mod error;
pub mod queue;
pub mod wait;

pub use buffer::{Buffer, Payload};
pub use error::{Error, Result};
pub use queue::{capacity_for, PopError, PushError, Queue};
pub use wait::Deadline;

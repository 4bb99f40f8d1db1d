//! Bounded, blocking, sealable cross-thread queue.
//!
//! # Design
//!
//! - Fixed slot capacity, at least one
//! - `push` blocks while full, `pop` blocks while empty, both bounded by a timeout
//! - `seal` is one-way: pushes fail from then on, pops drain what is left and
//!   then report `Done`
//! - Sealing wakes every waiter so nobody sits out a full timeout
//!
//! Built for one producer thread and one consumer thread. More of either are
//! safe but never needed by queue files.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::core::wait::Deadline;

/// Why a push did not enqueue. The rejected item is handed back.
#[derive(Debug)]
pub enum PushError<T> {
    /// No slot freed up before the timeout expired.
    Timeout(T),
    /// The queue was sealed; no push will ever succeed again.
    Sealed(T),
}

impl<T> PushError<T> {
    pub fn into_inner(self) -> T {
        match self {
            PushError::Timeout(item) | PushError::Sealed(item) => item,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PopError {
    /// Nothing arrived before the timeout expired.
    Timeout,
    /// Sealed and fully drained.
    Done,
}

struct State<T> {
    items: VecDeque<T>,
    sealed: bool,
}

pub struct Queue<T> {
    capacity: usize,
    state: Mutex<State<T>>,
    not_empty: Condvar,
    not_full: Condvar,
}

/// Slot count for a byte budget: `max(1, ceil(queue_bytes / block_size))`.
pub fn capacity_for(queue_bytes: usize, block_size: usize) -> usize {
    if block_size == 0 {
        return 1;
    }
    queue_bytes.div_ceil(block_size).max(1)
}

impl<T> Queue<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            state: Mutex::new(State {
                items: VecDeque::with_capacity(capacity),
                sealed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    /// Queue sized to hold `queue_bytes` worth of `block_size` blocks.
    pub fn with_byte_budget(queue_bytes: usize, block_size: usize) -> Self {
        Self::new(capacity_for(queue_bytes, block_size))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_sealed(&self) -> bool {
        self.lock().sealed
    }

    // State stays consistent across a panicking holder: every mutation is a
    // single VecDeque call or a bool store.
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue `item`, waiting up to `timeout` for a free slot.
    pub fn push(&self, item: T, timeout: Duration) -> Result<(), PushError<T>> {
        self.push_until(item, Deadline::after(timeout))
    }

    pub fn push_until(&self, item: T, deadline: Deadline) -> Result<(), PushError<T>> {
        let mut state = self.lock();
        loop {
            if state.sealed {
                return Err(PushError::Sealed(item));
            }
            if state.items.len() < self.capacity {
                state.items.push_back(item);
                drop(state);
                self.not_empty.notify_one();
                return Ok(());
            }
            state = match deadline.remaining() {
                None => self
                    .not_full
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(left) if left.is_zero() => return Err(PushError::Timeout(item)),
                Some(left) => {
                    self.not_full
                        .wait_timeout(state, left)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }

    /// Dequeue the oldest item, waiting up to `timeout` for one to arrive.
    pub fn pop(&self, timeout: Duration) -> Result<T, PopError> {
        self.pop_until(Deadline::after(timeout))
    }

    pub fn pop_until(&self, deadline: Deadline) -> Result<T, PopError> {
        let mut state = self.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                drop(state);
                self.not_full.notify_one();
                return Ok(item);
            }
            if state.sealed {
                return Err(PopError::Done);
            }
            state = match deadline.remaining() {
                None => self
                    .not_empty
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(left) if left.is_zero() => return Err(PopError::Timeout),
                Some(left) => {
                    self.not_empty
                        .wait_timeout(state, left)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }

    /// Dequeue without waiting.
    pub fn try_pop(&self) -> Option<T> {
        let item = self.lock().items.pop_front();
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// Refuse all further pushes and wake every waiter. Idempotent.
    pub fn seal(&self) {
        let mut state = self.lock();
        if state.sealed {
            return;
        }
        state.sealed = true;
        drop(state);
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }
}

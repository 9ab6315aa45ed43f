//! Fixed-capacity, FIFO, blocking handoff between threads.
//!
//! [`BoundedChannel`] coordinates a producer and a consumer with two
//! counting [`Semaphore`]s (free slots and filled slots) and a mutex over
//! the queued tokens:
//!
//! - `put` waits for a free slot, appends under the mutex, signals "filled".
//! - `take` waits for a filled slot, pops the oldest token under the mutex,
//!   signals "free".
//!
//! No more than `capacity` tokens are ever queued.

pub mod channel;
pub mod error;
pub mod semaphore;

pub use channel::{BoundedChannel, ChannelStats, SlotPermit, DEFAULT_CAPACITY};
pub use error::{ChannelError, Result};
pub use semaphore::Semaphore;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::{debug, error};

use crate::error::{ChannelError, Result};
use crate::semaphore::Semaphore;

/// Default number of slots.
pub const DEFAULT_CAPACITY: usize = 10;

/// Fixed-capacity FIFO handoff guarded by two counting semaphores.
///
/// `empty` counts slots the producer may fill (starts at `capacity`),
/// `full` counts tokens the consumer may drain (starts at zero). The token
/// queue itself sits behind a mutex that is only held for the push or pop.
#[derive(Debug)]
pub struct BoundedChannel<T> {
    capacity: usize,
    empty: Semaphore,
    full: Semaphore,
    queue: Mutex<VecDeque<T>>,
    closed: AtomicBool,
}

/// Point-in-time view of the channel counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelStats {
    pub capacity: usize,
    /// Permits on the "filled" semaphore.
    pub filled: usize,
    /// Permits on the "empty" semaphore.
    pub empty: usize,
    /// Tokens currently queued.
    pub queued: usize,
}

impl<T> BoundedChannel<T> {
    /// Create a channel with `capacity` slots.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(ChannelError::ZeroCapacity);
        }
        Ok(Self::with_slots(capacity))
    }

    fn with_slots(capacity: usize) -> Self {
        Self {
            capacity,
            empty: Semaphore::new(capacity),
            full: Semaphore::new(0),
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            closed: AtomicBool::new(false),
        }
    }

    /// Append a token, blocking while every slot is filled.
    pub fn put(&self, token: T) -> Result<()> {
        self.reserve()?.commit(token)
    }

    /// Wait for a free slot and hold it until the permit is committed or
    /// dropped.
    pub fn reserve(&self) -> Result<SlotPermit<'_, T>> {
        if self.is_closed() {
            return Err(ChannelError::Closed);
        }
        self.empty.acquire()?;
        Ok(SlotPermit {
            channel: self,
            armed: true,
        })
    }

    /// Like [`reserve`](Self::reserve) but returns `Ok(None)` instead of
    /// blocking when the channel is full.
    pub fn try_reserve(&self) -> Result<Option<SlotPermit<'_, T>>> {
        if self.is_closed() {
            return Err(ChannelError::Closed);
        }
        if !self.empty.try_acquire() {
            return Ok(None);
        }
        Ok(Some(SlotPermit {
            channel: self,
            armed: true,
        }))
    }

    /// Remove the oldest token, blocking until one is available.
    ///
    /// Returns `None` once the channel is closed and drained.
    pub fn take(&self) -> Option<T> {
        self.full.acquire().ok()?;
        self.pop_filled()
    }

    /// Remove the oldest token if one is queued right now.
    pub fn try_take(&self) -> Option<T> {
        if !self.full.try_acquire() {
            return None;
        }
        self.pop_filled()
    }

    /// Pop after a "filled" permit was acquired.
    ///
    /// # Panics
    ///
    /// Panics when the queue is empty. Every "filled" permit follows a push,
    /// so that state means the semaphore accounting is broken.
    fn pop_filled(&self) -> Option<T> {
        let Some(token) = self.queue.lock().pop_front() else {
            error!(
                capacity = self.capacity,
                "filled slot signalled with an empty queue"
            );
            panic!("bounded channel invariant violated: filled slot signalled with an empty queue");
        };
        self.empty.release();
        Some(token)
    }

    /// Stop accepting tokens and wake every blocked caller.
    ///
    /// Tokens already queued can still be taken.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!(queued = self.len(), "closing channel");
        }
        self.empty.close();
        self.full.close();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Tokens currently queued.
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> ChannelStats {
        ChannelStats {
            capacity: self.capacity,
            filled: self.full.available(),
            empty: self.empty.available(),
            queued: self.len(),
        }
    }
}

impl<T> Default for BoundedChannel<T> {
    fn default() -> Self {
        Self::with_slots(DEFAULT_CAPACITY)
    }
}

/// A reserved free slot.
///
/// Dropping the permit without committing gives the slot back.
#[must_use = "a reserved slot is released when the permit is dropped"]
#[derive(Debug)]
pub struct SlotPermit<'a, T> {
    channel: &'a BoundedChannel<T>,
    armed: bool,
}

impl<T> SlotPermit<'_, T> {
    /// Publish `token` into the reserved slot.
    pub fn commit(mut self, token: T) -> Result<()> {
        let channel = self.channel;
        if channel.is_closed() {
            return Err(ChannelError::Closed);
        }
        {
            let mut queue = channel.queue.lock();
            if queue.len() >= channel.capacity {
                return Err(ChannelError::CapacityExceeded {
                    queued: queue.len() + 1,
                    capacity: channel.capacity,
                });
            }
            queue.push_back(token);
        }
        self.armed = false;
        channel.full.release();
        Ok(())
    }
}

impl<T> Drop for SlotPermit<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            self.channel.empty.release();
        }
    }
}

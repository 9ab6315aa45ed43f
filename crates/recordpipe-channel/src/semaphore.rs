use parking_lot::{Condvar, Mutex};

use crate::error::{ChannelError, Result};

/// Counting semaphore with a close signal.
///
/// `acquire` blocks until a permit is available. Once closed, waiters wake
/// up and `acquire` keeps handing out remaining permits, then fails with
/// [`ChannelError::Closed`].
#[derive(Debug)]
pub struct Semaphore {
    state: Mutex<State>,
    available: Condvar,
}

#[derive(Debug)]
struct State {
    permits: usize,
    closed: bool,
}

impl Semaphore {
    /// Create a semaphore holding `permits` permits.
    pub fn new(permits: usize) -> Self {
        Self {
            state: Mutex::new(State {
                permits,
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Take one permit, blocking until one is available.
    pub fn acquire(&self) -> Result<()> {
        let mut state = self.state.lock();
        loop {
            if state.permits > 0 {
                state.permits -= 1;
                return Ok(());
            }
            if state.closed {
                return Err(ChannelError::Closed);
            }
            self.available.wait(&mut state);
        }
    }

    /// Take one permit if one is available right now.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock();
        if state.permits > 0 {
            state.permits -= 1;
            true
        } else {
            false
        }
    }

    /// Return one permit and wake one waiter.
    pub fn release(&self) {
        let mut state = self.state.lock();
        state.permits += 1;
        drop(state);
        self.available.notify_one();
    }

    /// Permits currently available.
    pub fn available(&self) -> usize {
        self.state.lock().permits
    }

    /// Wake every waiter; callers blocked with no permits left get `Closed`.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.available.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

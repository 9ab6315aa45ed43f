/// Errors raised by the bounded channel.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    /// The channel was closed; no further tokens are accepted.
    #[error("channel closed")]
    Closed,

    /// More tokens were queued than the channel admits. Only a broken
    /// semaphore discipline can cause this.
    #[error("channel capacity exceeded ({queued} queued, capacity {capacity})")]
    CapacityExceeded { queued: usize, capacity: usize },

    /// A channel cannot be created without any slots.
    #[error("channel capacity must be at least 1")]
    ZeroCapacity,
}

pub type Result<T> = std::result::Result<T, ChannelError>;

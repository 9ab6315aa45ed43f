//! Student records moved between a producer and a consumer.
//!
//! recordpipe carries the same records over two transports: an in-process
//! buffer bounded by counting semaphores, and a length-prefixed TCP stream.
//!
//! # Crate Structure
//!
//! - [`record`]: Record model and its `<ITStudent>` markup body
//! - [`transport`]: TCP listener and stream
//! - [`frame`]: Length-prefixed framing (identifier + body)
//! - [`channel`]: Counting semaphore and bounded channel
//! - [`pipeline`]: Producer/consumer loops, staging, server and client
//!   (behind `pipeline` feature)

/// Re-export record types.
pub mod record {
    pub use recordpipe_record::*;
}

/// Re-export transport types.
pub mod transport {
    pub use recordpipe_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use recordpipe_frame::*;
}

/// Re-export bounded channel types.
pub mod channel {
    pub use recordpipe_channel::*;
}

/// Re-export pipeline types (requires `pipeline` feature).
#[cfg(feature = "pipeline")]
pub mod pipeline {
    pub use recordpipe_pipeline::*;
}

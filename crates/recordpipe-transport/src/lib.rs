//! Connection-oriented byte stream transport.
//!
//! This is the lowest layer of recordpipe: a TCP listener that accepts
//! [`NetStream`]s and a matching client-side `connect`. Framing happens one
//! layer up; nothing here knows about message boundaries.

pub mod error;
pub mod stream;
pub mod tcp;

pub use error::{Result, TransportError};
pub use stream::NetStream;
pub use tcp::TcpTransport;

//! Length-prefixed framing of student records over byte streams.
//!
//! Every frame carries two length-prefixed sections:
//! - a 4-byte big-endian identifier length, then the UTF-8 identifier
//! - a 4-byte big-endian body length, then the UTF-8 markup body
//!
//! Readers always hand out complete frames. End of stream between frames is
//! a clean end; end of stream inside a frame is [`FrameError::Truncated`].

#[cfg(feature = "async")]
pub mod async_codec;
pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub use async_codec::RecordCodec;
pub use codec::{
    decode, decode_frame, encode, encode_frame, Frame, FrameConfig, Section, DEFAULT_MAX_SECTION,
    LENGTH_PREFIX_SIZE,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;

use recordpipe_record::RecordError;

use crate::codec::Section;

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The stream ended before a declared length was fully read.
    #[error("truncated frame: stream ended after {received} of {declared} {section} bytes")]
    Truncated {
        section: Section,
        declared: usize,
        received: usize,
    },

    /// The identifier section is not valid UTF-8.
    #[error("malformed frame: identifier is not valid UTF-8: {0}")]
    InvalidIdentifier(#[source] std::string::FromUtf8Error),

    /// The body section does not decode into a record.
    #[error("malformed frame: {0}")]
    Body(#[from] RecordError),

    /// Bytes follow a complete frame where none were expected.
    #[error("malformed frame: {0} unexpected bytes after frame")]
    TrailingBytes(usize),

    /// A section exceeds the configured maximum size.
    #[error("{section} too large ({size} bytes, max {max})")]
    PayloadTooLarge {
        section: Section,
        size: usize,
        max: usize,
    },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer stopped accepting bytes part-way through a frame.
    #[error("connection closed while writing frame")]
    ConnectionClosed,
}

impl FrameError {
    /// True for errors caused by the stream ending inside a frame.
    pub fn is_truncated(&self) -> bool {
        matches!(self, Self::Truncated { .. })
    }

    /// True for errors caused by frame content rather than the stream.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Self::InvalidIdentifier(_) | Self::Body(_) | Self::TrailingBytes(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;

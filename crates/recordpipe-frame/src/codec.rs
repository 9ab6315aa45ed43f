use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use recordpipe_record::{from_markup_bytes, to_markup, Record};

use crate::error::{FrameError, Result};

/// Size of each big-endian length prefix.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Default maximum size of either section: 16 MiB.
pub const DEFAULT_MAX_SECTION: usize = 16 * 1024 * 1024;

/// The four consecutive parts of a frame on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    IdentifierLength,
    Identifier,
    BodyLength,
    Body,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Section::IdentifierLength => "identifier length",
            Section::Identifier => "identifier",
            Section::BodyLength => "body length",
            Section::Body => "body",
        })
    }
}

/// One framed record: its logical identifier plus the markup body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Logical name of the record, e.g. `student3.xml`.
    pub identifier: String,
    /// Markup body bytes.
    pub body: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(identifier: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            identifier: identifier.into(),
            body: body.into(),
        }
    }

    /// Frame a record under `identifier`.
    pub fn from_record(identifier: impl Into<String>, record: &Record) -> Self {
        Self::new(identifier, to_markup(record))
    }

    /// Decode the body into a record.
    pub fn record(&self) -> Result<Record> {
        Ok(from_markup_bytes(&self.body)?)
    }

    /// The total wire size of this frame (prefixes + sections).
    pub fn wire_size(&self) -> usize {
        2 * LENGTH_PREFIX_SIZE + self.identifier.len() + self.body.len()
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────┬──────────────┬──────────┬──────────────┐
/// │ L1       │ Identifier   │ L2       │ Body         │
/// │ (4B BE)  │ (L1 bytes)   │ (4B BE)  │ (L2 bytes)   │
/// └──────────┴──────────────┴──────────┴──────────────┘
/// ```
pub fn encode_frame(identifier: &str, body: &[u8], dst: &mut BytesMut) -> Result<()> {
    let max = u32::MAX as usize;
    check_size(Section::Identifier, identifier.len(), max)?;
    check_size(Section::Body, body.len(), max)?;

    dst.reserve(2 * LENGTH_PREFIX_SIZE + identifier.len() + body.len());
    dst.put_u32(identifier.len() as u32);
    dst.put_slice(identifier.as_bytes());
    dst.put_u32(body.len() as u32);
    dst.put_slice(body);
    Ok(())
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, max_section: usize) -> Result<Option<Frame>> {
    if src.len() < LENGTH_PREFIX_SIZE {
        return Ok(None); // Need more data
    }

    let identifier_len = peek_len(&src[..])?;
    check_size(Section::Identifier, identifier_len, max_section)?;

    let body_prefix_at = LENGTH_PREFIX_SIZE + identifier_len;
    if src.len() < body_prefix_at + LENGTH_PREFIX_SIZE {
        return Ok(None);
    }

    let body_len = peek_len(&src[body_prefix_at..])?;
    check_size(Section::Body, body_len, max_section)?;

    if src.len() < body_prefix_at + LENGTH_PREFIX_SIZE + body_len {
        return Ok(None);
    }

    src.advance(LENGTH_PREFIX_SIZE);
    let identifier = src.split_to(identifier_len);
    src.advance(LENGTH_PREFIX_SIZE);
    let body = src.split_to(body_len).freeze();

    let identifier = String::from_utf8(identifier.to_vec()).map_err(FrameError::InvalidIdentifier)?;
    Ok(Some(Frame { identifier, body }))
}

/// Encode `record` under `identifier` as one self-contained frame.
pub fn encode(identifier: &str, record: &Record) -> Result<Bytes> {
    let body = to_markup(record);
    let mut dst = BytesMut::with_capacity(2 * LENGTH_PREFIX_SIZE + identifier.len() + body.len());
    encode_frame(identifier, body.as_bytes(), &mut dst)?;
    Ok(dst.freeze())
}

/// Decode exactly one frame produced by [`encode`].
///
/// An incomplete frame is [`FrameError::Truncated`]; extra bytes after the
/// frame are [`FrameError::TrailingBytes`].
pub fn decode(bytes: &[u8]) -> Result<(String, Record)> {
    let mut buf = BytesMut::from(bytes);
    let frame = match decode_frame(&mut buf, u32::MAX as usize)? {
        Some(frame) => frame,
        None => return Err(truncation(bytes)),
    };
    if !buf.is_empty() {
        return Err(FrameError::TrailingBytes(buf.len()));
    }
    let record = frame.record()?;
    Ok((frame.identifier, record))
}

/// Describe where an incomplete frame stops.
///
/// `partial` must be a prefix of a frame that [`decode_frame`] reported as
/// incomplete.
pub(crate) fn truncation(partial: &[u8]) -> FrameError {
    let truncated = |section, declared: usize, received: usize| FrameError::Truncated {
        section,
        declared,
        received,
    };

    if partial.len() < LENGTH_PREFIX_SIZE {
        return truncated(Section::IdentifierLength, LENGTH_PREFIX_SIZE, partial.len());
    }
    let identifier_len = (&partial[..LENGTH_PREFIX_SIZE]).get_u32() as usize;
    let rest = &partial[LENGTH_PREFIX_SIZE..];
    if rest.len() < identifier_len {
        return truncated(Section::Identifier, identifier_len, rest.len());
    }

    let rest = &rest[identifier_len..];
    if rest.len() < LENGTH_PREFIX_SIZE {
        return truncated(Section::BodyLength, LENGTH_PREFIX_SIZE, rest.len());
    }
    let body_len = (&rest[..LENGTH_PREFIX_SIZE]).get_u32() as usize;
    let rest = &rest[LENGTH_PREFIX_SIZE..];
    truncated(Section::Body, body_len, rest.len().min(body_len))
}

fn peek_len(src: &[u8]) -> Result<usize> {
    let mut prefix = src;
    if prefix.remaining() < LENGTH_PREFIX_SIZE {
        return Err(FrameError::Truncated {
            section: Section::IdentifierLength,
            declared: LENGTH_PREFIX_SIZE,
            received: prefix.remaining(),
        });
    }
    Ok(prefix.get_u32() as usize)
}

fn check_size(section: Section, size: usize, max: usize) -> Result<()> {
    if size > max {
        return Err(FrameError::PayloadTooLarge { section, size, max });
    }
    Ok(())
}

/// Configuration for frame readers and writers.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum size of each section in bytes. Default: 16 MiB.
    pub max_section_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_section_size: DEFAULT_MAX_SECTION,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

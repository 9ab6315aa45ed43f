//! `tokio-util` codec for use with `FramedRead` / `FramedWrite`.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_frame, encode_frame, truncation, Frame, DEFAULT_MAX_SECTION};
use crate::error::{FrameError, Result};

/// Frame codec for async streams.
#[derive(Debug, Clone)]
pub struct RecordCodec {
    max_section_size: usize,
}

impl RecordCodec {
    pub fn new() -> Self {
        Self::with_max_section_size(DEFAULT_MAX_SECTION)
    }

    pub fn with_max_section_size(max_section_size: usize) -> Self {
        Self { max_section_size }
    }
}

impl Default for RecordCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for RecordCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        decode_frame(src, self.max_section_size)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => Err(truncation(src)),
        }
    }
}

impl Encoder<Frame> for RecordCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<()> {
        encode_frame(&item.identifier, &item.body, dst)
    }
}

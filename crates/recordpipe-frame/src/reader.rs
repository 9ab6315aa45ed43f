use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use recordpipe_record::Record;
use recordpipe_transport::NetStream;
use tracing::trace;

use crate::codec::{decode_frame, truncation, Frame, FrameConfig};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete frames from any `Read` stream.
///
/// Handles partial reads internally; callers always get complete frames.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Ok(None)` when the stream ends on a frame boundary and
    /// [`FrameError::Truncated`] when it ends inside a frame.
    pub fn read_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            if let Some(frame) = decode_frame(&mut self.buf, self.config.max_section_size)? {
                trace!(
                    identifier = %frame.identifier,
                    body_len = frame.body.len(),
                    "frame decoded"
                );
                return Ok(Some(frame));
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Err(truncation(&self.buf));
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Read the next frame and decode its body.
    pub fn read_record(&mut self) -> Result<Option<(String, Record)>> {
        match self.read_frame()? {
            Some(frame) => {
                let record = frame.record()?;
                Ok(Some((frame.identifier, record)))
            }
            None => Ok(None),
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl FrameReader<NetStream> {
    /// Create a frame reader for `NetStream` and apply read timeout from config.
    pub fn with_config_net(inner: NetStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

pub(crate) fn transport_to_frame_error(err: recordpipe_transport::TransportError) -> FrameError {
    match err {
        recordpipe_transport::TransportError::Io(io)
        | recordpipe_transport::TransportError::Accept(io)
        | recordpipe_transport::TransportError::Resolve(io) => FrameError::Io(io),
        recordpipe_transport::TransportError::Bind { source, .. }
        | recordpipe_transport::TransportError::Connect { source, .. } => FrameError::Io(source),
    }
}
